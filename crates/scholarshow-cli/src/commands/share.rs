use std::path::Path;

use scholarshow_core::models::{ShareContent, ShareItem};
use scholarshow_core::share::ShareView;
use scholarshow_core::ShareKind;

use crate::commands::canvas::write_canvas_png;
use crate::commands::common::{preview, App};
use crate::commands::notes::format_attachment_lines;
use crate::error::CliError;

pub async fn run_share(kind: ShareKind, app: &App) -> Result<(), CliError> {
    let share = app.toolkit.share(kind).await?;
    if !share.created {
        eprintln!("Already shared; link unchanged");
    }
    println!("{}", share.link);
    Ok(())
}

pub async fn run_unshare(kind: ShareKind, app: &App) -> Result<(), CliError> {
    match app.toolkit.unshare(kind).await? {
        Some(id) => println!("Stopped sharing {kind} {id}"),
        None => println!("The {kind} is not shared"),
    }
    Ok(())
}

pub async fn run_open(link: &str, output: Option<&Path>, app: &App) -> Result<(), CliError> {
    let mut resolver = app.toolkit.resolver();
    match resolver.navigate(link).await {
        ShareView::Displaying(item) => {
            for line in format_share_item(item) {
                println!("{line}");
            }
            if let (ShareContent::Canvas(image), Some(path)) = (&item.content, output) {
                write_canvas_png(image, path)?;
                println!("{}", path.display());
            }
            Ok(())
        }
        ShareView::Error(failure) => Err(CliError::Share(failure.to_string())),
        ShareView::Idle | ShareView::Loading(_) => Err(CliError::Share(format!(
            "'{link}' is not a share link"
        ))),
    }
}

pub fn format_share_item(item: &ShareItem) -> Vec<String> {
    let mut lines = vec![format!("Shared {} {}", item.content.kind(), item.id)];
    if let Some(updated_at) = item.updated_at {
        lines.push(format!(
            "Updated {}",
            updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    match &item.content {
        ShareContent::Note(note) => {
            lines.push(String::new());
            lines.push(if note.text.is_empty() {
                "(empty note)".to_string()
            } else {
                note.text.clone()
            });
            lines.extend(format_attachment_lines(&note.attachments));
        }
        ShareContent::Canvas(image) => {
            lines.push(format!(
                "Canvas image ({})",
                preview(image.as_str(), 40)
            ));
        }
    }
    lines
}
