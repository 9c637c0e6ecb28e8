use std::path::Path;

use scholarshow_core::models::Attachment;
use scholarshow_core::remote::FileUpload;

use crate::cli::NotesCommands;
use crate::commands::common::{capture_editor_input, content_type_for, resolve_text, App};
use crate::error::CliError;

pub async fn run_notes(command: Option<NotesCommands>, app: &App) -> Result<(), CliError> {
    match command.unwrap_or(NotesCommands::Show) {
        NotesCommands::Show => {
            let state = app.toolkit.state();
            if state.notes.is_empty() {
                println!("(no notes)");
            } else {
                println!("{}", state.notes);
            }
            for line in format_attachment_lines(&state.note_attachments) {
                println!("{line}");
            }
        }
        NotesCommands::Set { content } => {
            let text = resolve_text(&content)?;
            app.toolkit.set_notes(&text)?;
            println!("Notes saved");
        }
        NotesCommands::Append { content } => {
            let text = resolve_text(&content)?;
            app.toolkit.append_notes(&text)?;
            println!("Notes saved");
        }
        NotesCommands::Edit => {
            let current = app.toolkit.state().notes;
            let edited = capture_editor_input(&current)?.unwrap_or_default();
            if edited == current.trim() {
                println!("Notes unchanged");
            } else {
                app.toolkit.set_notes(&edited)?;
                println!("Notes saved");
            }
        }
        NotesCommands::Attach { path } => run_attach(&path, app).await?,
        NotesCommands::Detach { number } => {
            let index = number
                .checked_sub(1)
                .ok_or(CliError::InvalidAttachmentNumber)?;
            let removed = app.toolkit.detach(index)?;
            println!("Removed attachment {}", removed.name);
        }
    }
    Ok(())
}

async fn run_attach(path: &Path, app: &App) -> Result<(), CliError> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map_or_else(|| "attachment".to_string(), str::to_string);

    let attachment = app
        .toolkit
        .attach(FileUpload {
            name,
            bytes,
            content_type: content_type_for(path).map(str::to_string),
        })
        .await?;
    println!("Attached {} ({})", attachment.name, attachment.url);
    Ok(())
}

pub fn format_attachment_lines(attachments: &[Attachment]) -> Vec<String> {
    attachments
        .iter()
        .enumerate()
        .map(|(index, attachment)| format!("[{}] {}  {}", index + 1, attachment.name, attachment.url))
        .collect()
}
