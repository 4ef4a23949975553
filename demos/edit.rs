use rgenedit::{
    logger::{self, LogLevel, LoggerConfig},
    AdjustmentPreset, CancelToken, Editor, EditorConfig, ExportFormat, FilterPreset, ImageArtifact,
};
use std::env;
use std::fs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    match dotenv::dotenv() {
        Ok(_) => log::info!("✅ .env file loaded"),
        Err(_) => log::warn!("⚠️  No .env file found"),
    }
    logger::init_with_config(LoggerConfig::development().with_level(LogLevel::Debug))?;

    let input = env::args().nth(1).unwrap_or_else(|| "photo.jpg".to_string());
    let editor = Editor::connect(&EditorConfig::from_env()).await?;
    editor.load(ImageArtifact::from_file(&input)?)?;

    let cancel = CancelToken::new();
    editor.apply_filter_preset(FilterPreset::Lomo, &cancel).await?;
    editor
        .apply_adjustment_preset(AdjustmentPreset::WarmerLighting, &cancel)
        .await?;

    // Step back to the filtered version and branch from there.
    editor.undo()?;
    editor.enhance(&cancel).await?;
    log::info!("Can redo after branching: {}", editor.can_redo());

    if let Some((before, after)) = editor.compare() {
        fs::write("before.png", before.data())?;
        fs::write("after.jpg", editor.export(ExportFormat::Jpeg { quality: 0.9 })?.data())?;
        log::info!("📏 {} bytes -> {} bytes", before.len(), after.len());
    }

    editor.start_over()?;
    log::info!("Back at the original: {}", !editor.can_undo());

    Ok(())
}
