//! Board commands: `board`, `add`, `move`, `rm`.

use anyhow::{Context, Result, bail};
use console::style;
use futures::future::join_all;

use taskboard::board::{
    BoardController, BoardView, DragEnd, HttpTaskApi, StatusChange, SyncEvent, Synchronizer,
    TaskForm, TaskId,
};
use taskboard::config::ClientConfig;
use taskboard::errors::{BoardError, SyncError};

/// Build a controller against the configured service and load the board.
///
/// A failed load prints the board's error state and is returned as an error.
async fn open_board(api_url: Option<&str>) -> Result<BoardController<HttpTaskApi>> {
    let config = ClientConfig::from_env(api_url)?;
    tracing::debug!(api_url = config.api_url(), "Connecting to task service");
    let api = HttpTaskApi::new(config).context("Failed to create HTTP client")?;
    let board = BoardController::new(Synchronizer::new(api));

    if let Err(err) = board.load().await {
        eprintln!("{} {}", style("✗").red().bold(), style(&err).red());
        return Err(err.into());
    }
    Ok(board)
}

pub fn render_board(view: &BoardView) -> String {
    let mut out = String::new();
    for column in &view.columns {
        out.push_str(&format!(
            "{} {}\n",
            style(column.status.title()).bold().underlined(),
            style(format!("({})", column.tasks.len())).dim()
        ));
        if column.tasks.is_empty() {
            out.push_str(&format!("  {}\n", style("(empty)").dim()));
        }
        for task in &column.tasks {
            out.push_str(&format!(
                "  {} {}  {}\n",
                style("•").cyan(),
                style(task.id.as_str()).yellow(),
                task.title
            ));
            out.push_str(&format!("      {}\n", style(&task.description).dim()));
        }
    }
    out
}

fn print_board(board: &BoardController<HttpTaskApi>) -> Result<()> {
    let view = board.view()?;
    print!("{}", render_board(&view));
    Ok(())
}

pub async fn cmd_board(api_url: Option<&str>) -> Result<()> {
    let board = open_board(api_url).await?;
    print_board(&board)
}

pub async fn cmd_add(api_url: Option<&str>, title: &str, description: &str) -> Result<()> {
    let board = open_board(api_url).await?;
    let task = board.submit(&TaskForm::new(title, description)).await?;
    println!(
        "{} Added {} to {}",
        style("✓").green().bold(),
        style(task.id.as_str()).yellow(),
        task.status.title()
    );
    print_board(&board)
}

pub async fn cmd_move(api_url: Option<&str>, id: &str, column: &str) -> Result<()> {
    let board = open_board(api_url).await?;
    match board.on_drag_end(DragEnd::new(id, Some(column))).await? {
        StatusChange::Unchanged => println!(
            "{} {} is already there",
            style("•").dim(),
            style(id).yellow()
        ),
        StatusChange::Moved(task) => println!(
            "{} Moved {} to {}",
            style("✓").green().bold(),
            style(task.id.as_str()).yellow(),
            task.status.title()
        ),
    }
    print_board(&board)
}

/// Delete every id concurrently and report each outcome.
pub async fn cmd_rm(api_url: Option<&str>, ids: &[String]) -> Result<()> {
    let board = open_board(api_url).await?;
    let mut events = board.subscribe();

    let ids: Vec<TaskId> = ids.iter().map(|id| TaskId::new(id.as_str())).collect();
    let results = join_all(ids.iter().map(|id| board.delete(id))).await;

    while let Ok(event) = events.try_recv() {
        match &event {
            SyncEvent::TaskDeleted { .. } => {
                println!("{} {}", style("✓").green().bold(), event.summary())
            }
            SyncEvent::SyncFailed { .. } => {
                eprintln!("{} {}", style("✗").red().bold(), style(event.summary()).red())
            }
            _ => {}
        }
    }
    // Local rejections (unknown ids) never reach the event channel.
    for (id, result) in ids.iter().zip(&results) {
        if let Err(err @ BoardError::Sync(SyncError::UnknownTask(_))) = result {
            eprintln!("{} {}: {}", style("✗").red().bold(), id, style(err).red());
        }
    }

    let failed = results.iter().filter(|r| r.is_err()).count();
    print_board(&board)?;
    if failed > 0 {
        bail!("{} of {} deletions failed", failed, results.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard::board::{Task, TaskStatus};

    #[test]
    fn test_render_board_lists_columns_in_order() {
        let tasks = vec![
            Task::new(TaskId::new("a"), "Write docs", "API reference"),
            Task::new(TaskId::new("b"), "Ship it", "Cut a release").with_status(TaskStatus::Done),
        ];
        let view = BoardView::from_tasks(&tasks);
        let out = console::strip_ansi_codes(&render_board(&view)).to_string();

        let todo = out.find("To Do (1)").unwrap();
        let in_progress = out.find("In Progress (0)").unwrap();
        let done = out.find("Done (1)").unwrap();
        assert!(todo < in_progress && in_progress < done);
        assert!(out.contains("a  Write docs"));
        assert!(out.contains("API reference"));
        assert!(out.contains("(empty)"));
    }
}
