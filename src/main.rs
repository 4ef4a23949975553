use rgenedit::{
    logger::{self, LoggerConfig},
    CancelToken, CropRect, Editor, EditorConfig, ExportFormat, FilterPreset, FocusPoint,
    ImageArtifact, ProviderKind, ResizeMode,
};
use std::env;
use std::fs;

const USAGE: &str = "usage: rgenedit <input> <operation> [args...] [--out <path>]

operations:
  enhance
  remove-background
  filter <instruction | preset>
  adjust <instruction>
  retouch <x> <y> <instruction>
  ocr
  faces
  crop <x> <y> <width> <height>
  resize <width> <height>
  models";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    match dotenv::dotenv() {
        Ok(_) => log::info!("✅ .env file loaded successfully"),
        Err(_) => log::warn!("⚠️  No .env file found, using system environment variables"),
    }

    logger::init_with_config(LoggerConfig::from_env())?;

    let mut args: Vec<String> = env::args().skip(1).collect();
    let out_path = match args.iter().position(|arg| arg == "--out") {
        Some(index) if index + 1 < args.len() => {
            let path = args.remove(index + 1);
            args.remove(index);
            Some(path)
        }
        _ => None,
    };

    if args.first().map(String::as_str) == Some("models") {
        print_models();
        return Ok(());
    }
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }

    let input = &args[0];
    let operation = args[1].as_str();
    let rest = &args[2..];

    let config = EditorConfig::from_env();
    let editor = match Editor::connect(&config).await {
        Ok(editor) => {
            log::info!("✅ Connected to {}", editor.service_name());
            editor
        }
        Err(e) => {
            log::error!("❌ Failed to initialize editor: {}", e);
            return Err(e.into());
        }
    };

    let source = ImageArtifact::from_file(input)?;
    let (width, height) = source.dimensions()?;
    log::info!("🖼️  {} is {}x{}", input, width, height);
    editor.load(source)?;

    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    let outcome = match operation {
        "enhance" => editor.enhance(&cancel).await.map(|_| ()),
        "remove-background" => editor.remove_background(&cancel).await.map(|_| ()),
        "filter" => {
            let text = rest.join(" ");
            let preset = FilterPreset::all()
                .iter()
                .find(|preset| preset.label().eq_ignore_ascii_case(&text));
            let filtered = match preset {
                Some(preset) => editor.apply_filter_preset(*preset, &cancel).await,
                None => editor.apply_filter(&text, &cancel).await,
            };
            filtered.map(|_| ())
        }
        "adjust" => editor.apply_adjustment(&rest.join(" "), &cancel).await.map(|_| ()),
        "retouch" => {
            let [x, y, words @ ..] = rest else {
                eprintln!("{}", USAGE);
                std::process::exit(2);
            };
            let focus = FocusPoint::new(x.parse()?, y.parse()?);
            editor.edit_at(&words.join(" "), focus, &cancel).await.map(|_| ())
        }
        "ocr" => editor.extract_text(&cancel).await.map(|text| println!("{}", text)),
        "faces" => editor.detect_faces(&cancel).await.map(|faces| {
            for face in faces {
                let (x, y, w, h) = face.to_pixels(width, height);
                println!("face at {},{} size {}x{}", x, y, w, h);
            }
        }),
        "crop" => {
            let numbers = rest
                .iter()
                .map(|value| value.parse::<u32>())
                .collect::<Result<Vec<_>, _>>()?;
            let [x, y, w, h] = numbers[..] else {
                eprintln!("{}", USAGE);
                std::process::exit(2);
            };
            editor.crop(CropRect::new(x, y, w, h)).map(|_| ())
        }
        "resize" => {
            let numbers = rest
                .iter()
                .map(|value| value.parse::<u32>())
                .collect::<Result<Vec<_>, _>>()?;
            let [w, h] = numbers[..] else {
                eprintln!("{}", USAGE);
                std::process::exit(2);
            };
            editor.resize(w, h, ResizeMode::Fit).map(|_| ())
        }
        other => {
            eprintln!("unknown operation '{}'\n\n{}", other, USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = outcome {
        log::error!("❌ {}", e.user_message());
        return Err(e.into());
    }

    if let Some(path) = out_path {
        let format = path
            .rsplit('.')
            .next()
            .and_then(ExportFormat::parse)
            .unwrap_or(ExportFormat::Png);
        let exported = editor.export(format)?;
        fs::write(&path, exported.data())?;
        log::info!("💾 Saved {}", path);
    }

    Ok(())
}

fn print_models() {
    match EditorConfig::from_env().provider {
        #[cfg(feature = "gemini")]
        ProviderKind::Gemini => {
            log::info!("📚 Gemini models:");
            for (id, used_for) in rgenedit::GeminiClient::supported_models() {
                log::info!("  {} - {}", id, used_for);
            }
        }
        #[cfg(feature = "bedrock")]
        ProviderKind::Bedrock => {
            log::info!("📚 Bedrock models:");
            for (id, name, provider) in rgenedit::BedrockClient::supported_models() {
                log::info!("  {} - {} ({})", id, name, provider);
            }
        }
        #[allow(unreachable_patterns)]
        _ => log::warn!("⚠️  Provider support not compiled in"),
    }
}
