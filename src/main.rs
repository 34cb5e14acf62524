//! Bookmark Sentinel console report.
//!
//! Opens the bookmark database, verifies every bookmark and prints the tree
//! with link status and safety verdicts.
//!
//! Usage: `bookmark-sentinel [DB_PATH]` (default `sentinel.db`). A
//! `VIRUSTOTAL_API_KEY` environment variable overrides the stored credential.

use std::process::ExitCode;

use bookmark_sentinel::app::App;
use bookmark_sentinel::logging;
use bookmark_sentinel::managers::tree_engine::{count_bookmarks, find_bookmark, find_duplicates, folder_paths};
use bookmark_sentinel::services::safety_checker::url_report_url;
use bookmark_sentinel::types::bookmark::BookmarkNode;
use bookmark_sentinel::types::verification::SafetyStatus;
use log::LevelFilter;

fn print_nodes(nodes: &[BookmarkNode], depth: usize) {
    let indent = "  ".repeat(depth + 1);
    for node in nodes {
        match node {
            BookmarkNode::Folder(folder) => {
                println!("{}📁 {}", indent, folder.title);
                print_nodes(&folder.children, depth + 1);
            }
            BookmarkNode::Bookmark(item) => {
                let tags = if item.tags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", item.tags.join(", "))
                };
                let verdict = item.safety.summary();
                println!("{}🔖 {}{} <{}>", indent, item.title, tags, item.url);
                println!(
                    "{}   {} | {}",
                    indent,
                    item.status.describe(),
                    verdict.lines().next().unwrap_or_default()
                );
                if matches!(item.safety.status, SafetyStatus::Unsafe | SafetyStatus::Warning) {
                    println!("{}   report: {}", indent, url_report_url(&item.url));
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = logging::init(LevelFilter::Info) {
        eprintln!("Logger already installed: {}", e);
    }

    let db_path = std::env::args().nth(1).unwrap_or_else(|| "sentinel.db".to_string());
    let app = match App::new(&db_path) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to open {}: {}", db_path, e);
            return ExitCode::FAILURE;
        }
    };

    if let Ok(key) = std::env::var("VIRUSTOTAL_API_KEY") {
        if let Err(e) = app.settings.set_api_key(&key) {
            eprintln!("Could not store API key: {}", e);
        }
    }

    let tasks = match app.start().await {
        Ok(tasks) => tasks,
        Err(e) => {
            eprintln!("Failed to load bookmarks: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let summary = match tasks.verification.await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Verification task failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tasks.watcher.abort();

    let tree = app.session.snapshot();
    println!();
    print_nodes(&tree, 0);
    println!();
    println!(
        "  {} bookmark(s), {} status check(s), {} safety check(s)",
        count_bookmarks(&tree),
        summary.status_checked,
        summary.safety_checked
    );
    let paths = folder_paths(&tree);
    for (url, ids) in find_duplicates(&tree) {
        let places: Vec<&str> = ids
            .iter()
            .filter_map(|id| find_bookmark(&tree, id))
            .map(|item| {
                item.parent_id
                    .as_ref()
                    .and_then(|parent| paths.get(parent))
                    .map_or("(top level)", String::as_str)
            })
            .collect();
        println!("  ⚠ {} is bookmarked {} times: {}", url, ids.len(), places.join(", "));
    }

    app.shutdown().await;
    ExitCode::SUCCESS
}
