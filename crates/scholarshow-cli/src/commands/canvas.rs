use std::path::Path;

use scholarshow_core::models::CanvasImage;

use crate::cli::CanvasCommands;
use crate::commands::common::{is_png, App};
use crate::error::CliError;

pub fn run_canvas(command: CanvasCommands, app: &App) -> Result<(), CliError> {
    match command {
        CanvasCommands::Import { path } => {
            let bytes = std::fs::read(&path)?;
            if !is_png(&bytes) {
                return Err(CliError::NotPng(path.display().to_string()));
            }
            app.toolkit.save_canvas(CanvasImage::from_png_bytes(&bytes))?;
            println!("Canvas saved");
        }
        CanvasCommands::Export { path } => {
            write_canvas_png(&app.toolkit.state().canvas_image, &path)?;
            println!("{}", path.display());
        }
        CanvasCommands::Clear => {
            app.toolkit.clear_canvas()?;
            println!("Canvas cleared");
        }
    }
    Ok(())
}

pub fn write_canvas_png(image: &CanvasImage, path: &Path) -> Result<(), CliError> {
    if image.is_empty() {
        return Err(CliError::EmptyCanvas);
    }
    std::fs::write(path, image.to_png_bytes()?)?;
    Ok(())
}
