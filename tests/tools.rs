//! Integration tests for the built-in tools, driven through the registry
//! the agent uses.

use intelligent_agent::config::Config;
use intelligent_agent::tools::ToolRegistry;
use tempfile::TempDir;

/// Helper: a registry rooted in a fresh temp workspace.
fn workspace() -> (TempDir, Config, ToolRegistry) {
    let ws = tempfile::tempdir().expect("failed to create temp dir");
    let cfg = Config {
        notes_dir: ws.path().join("agent_notes"),
        visualizations_dir: ws.path().join("visualizations"),
        working_dir: Some(ws.path().to_path_buf()),
        ..Config::default()
    };
    let tools = ToolRegistry::from_config(&cfg);
    (ws, cfg, tools)
}

fn entries(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|rd| rd.count()).unwrap_or(0)
}

#[tokio::test]
async fn registry_has_four_tools_in_order() {
    let (_ws, _cfg, tools) = workspace();
    assert_eq!(
        tools.names(),
        ["WebSearch", "WeatherLookup", "SystemTool", "DataVisualization"]
    );
    for meta in tools.list_tools() {
        assert!(!meta.description.is_empty(), "{} has no description", meta.name);
    }
}

// ── SystemTool ───────────────────────────────────────────────

#[tokio::test]
async fn unknown_command_is_refused() {
    let (ws, cfg, tools) = workspace();
    let out = tools.call_tool("SystemTool", "rm -rf /").await;
    assert_eq!(
        out,
        "Command 'rm' is not allowed. Allowed commands: date, time, system_info, list_directory, create_note, read_note"
    );
    assert!(!cfg.notes_dir.exists());
    assert_eq!(entries(ws.path()), 1, "only the visualizations dir should exist");
}

#[tokio::test]
async fn note_round_trip() {
    let (_ws, cfg, tools) = workspace();
    let saved = tools
        .call_tool("SystemTool", "create_note Shopping List|eggs, milk")
        .await;
    assert!(saved.starts_with("Note saved as "), "{saved}");
    assert!(saved.ends_with("_Shopping_List.txt"), "{saved}");
    assert_eq!(entries(&cfg.notes_dir), 1);

    let read = tools.call_tool("SystemTool", "read_note shopping").await;
    assert!(read.starts_with("Note: "), "{read}");
    assert!(read.ends_with("\n\neggs, milk"), "{read}");
}

#[tokio::test]
async fn same_title_keeps_both_and_reads_latest() {
    let (_ws, cfg, tools) = workspace();
    tools.call_tool("SystemTool", "create_note plan|first").await;
    tools.call_tool("SystemTool", "create_note plan|second").await;
    assert_eq!(entries(&cfg.notes_dir), 2);

    let read = tools.call_tool("SystemTool", "read_note plan").await;
    assert!(read.ends_with("second"), "{read}");
}

#[tokio::test]
async fn create_note_without_separator_writes_nothing() {
    let (_ws, cfg, tools) = workspace();
    let out = tools.call_tool("SystemTool", "create_note no separator here").await;
    assert_eq!(out, "Error: Format should be 'title|content'");
    assert_eq!(entries(&cfg.notes_dir), 0);
}

#[tokio::test]
async fn list_directory_defaults_to_working_dir() {
    let (ws, _cfg, tools) = workspace();
    std::fs::write(ws.path().join("readme.md"), "hi").unwrap();
    let out = tools.call_tool("SystemTool", "list_directory").await;
    assert!(out.starts_with(&format!("Directory: {}", ws.path().display())), "{out}");
    assert!(out.contains("Folders:\nvisualizations"), "{out}");
    assert!(out.ends_with("Files:\nreadme.md"), "{out}");
}

// ── DataVisualization ────────────────────────────────────────

#[tokio::test]
async fn bar_chart_is_written() {
    let (_ws, cfg, tools) = workspace();
    let out = tools
        .call_tool("DataVisualization", "bar|Jan,10,Feb,15|Sales")
        .await;
    let expected = cfg.visualizations_dir.join("Sales.png");
    assert_eq!(
        out,
        format!("Visualization created and saved as {}", expected.display())
    );
    assert!(expected.is_file());
}

#[tokio::test]
async fn odd_data_writes_nothing() {
    let (_ws, cfg, tools) = workspace();
    let out = tools.call_tool("DataVisualization", "bar|Jan,10,Feb|Sales").await;
    assert_eq!(out, "Error: Data should be comma-separated x,y pairs");
    assert_eq!(entries(&cfg.visualizations_dir), 0);
}

#[tokio::test]
async fn unknown_kind_writes_nothing() {
    let (_ws, cfg, tools) = workspace();
    let out = tools.call_tool("DataVisualization", "radar|a,1,b,2|Skills").await;
    assert_eq!(out, "Error: Unsupported visualization type 'radar'");
    assert_eq!(entries(&cfg.visualizations_dir), 0);
}

#[tokio::test]
async fn missing_parts_is_format_error() {
    let (_ws, _cfg, tools) = workspace();
    let out = tools.call_tool("DataVisualization", "bar|a,1").await;
    assert_eq!(out, "Error: Format should be 'type|data|title'");
}

#[tokio::test]
async fn unknown_tool_name() {
    let (_ws, _cfg, tools) = workspace();
    let out = tools.call_tool("Teleport", "mars").await;
    assert!(out.starts_with("unknown tool: Teleport"), "{out}");
}
