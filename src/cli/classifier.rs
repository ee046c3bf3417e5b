//! Classifier inspection and configuration commands.

use anyhow::{Context, Result};
use dialoguer::{Input, Select};
use std::path::Path;

use crate::camera::CapturedFrame;
use crate::classifier::{self, ClassifierStatus};
use crate::config::Config;

use super::args::{ClassifierCliArgs, ClassifierCommand};

pub async fn handle_classifier_command(args: ClassifierCliArgs) -> Result<()> {
    match args.command {
        ClassifierCommand::Show => show(),
        ClassifierCommand::Configure => configure(),
        ClassifierCommand::Test { image } => test(image.as_deref()).await,
    }
}

fn show() -> Result<()> {
    let config = Config::load()?;

    println!("Classifier configuration:");
    println!(
        "  provider:     {}",
        config.classifier.provider.as_deref().unwrap_or("(none)")
    );
    println!(
        "  api_endpoint: {}",
        config.classifier.api_endpoint.as_deref().unwrap_or("(none)")
    );
    println!(
        "  api_key:      {}",
        if config.classifier.api_key.is_some() {
            "(set)"
        } else {
            "(none)"
        }
    );
    println!(
        "  model:        {}",
        config.classifier.model.as_deref().unwrap_or("(default)")
    );

    match classifier::status_from_config(&config.classifier) {
        ClassifierStatus::Ready { provider, .. } => {
            println!("\nStatus: ready ({})", provider);
        }
        ClassifierStatus::ConfigError { provider, error } => {
            println!("\nStatus: configuration error ({}): {}", provider, error);
        }
        ClassifierStatus::NotConfigured => {
            println!("\nStatus: no provider configured");
        }
    }

    Ok(())
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let providers = ["vision-api", "gemini"];
    let current = config
        .classifier
        .provider
        .as_deref()
        .and_then(|p| providers.iter().position(|candidate| *candidate == p))
        .unwrap_or(0);

    let selection = Select::new()
        .with_prompt("Classifier provider")
        .items(&providers)
        .default(current)
        .interact()?;
    let provider = providers[selection];

    match provider {
        "vision-api" => {
            let endpoint: String = Input::new()
                .with_prompt("API endpoint")
                .with_initial_text(config.classifier.api_endpoint.clone().unwrap_or_default())
                .interact_text()?;
            config.classifier.api_endpoint = Some(endpoint);

            let api_key: String = Input::new()
                .with_prompt("API key (empty for none)")
                .allow_empty(true)
                .interact_text()?;
            config.classifier.api_key = (!api_key.is_empty()).then_some(api_key);
        }
        "gemini" => {
            let api_key: String = Input::new()
                .with_prompt("API key")
                .interact_text()?;
            config.classifier.api_key = Some(api_key);

            let model: String = Input::new()
                .with_prompt("Model (empty for default)")
                .allow_empty(true)
                .interact_text()?;
            config.classifier.model = (!model.is_empty()).then_some(model);
        }
        _ => unreachable!(),
    }

    config.classifier.provider = Some(provider.to_string());
    config.save()?;

    println!("Classifier configuration saved.");
    Ok(())
}

async fn test(image: Option<&Path>) -> Result<()> {
    let config = Config::load()?;
    let classifier = classifier::from_config(&config.classifier)?;

    println!("Classifier {} initialized.", classifier.name());

    let Some(path) = image else {
        println!("No image supplied; configuration is valid.");
        return Ok(());
    };

    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read image file {:?}", path))?;
    let frame = CapturedFrame::jpeg(data);

    let start = std::time::Instant::now();
    let detection = classifier::classify_frame(classifier.as_ref(), &frame).await?;

    println!(
        "Result after {:.2}s: face_detected={} message={:?}",
        start.elapsed().as_secs_f64(),
        detection.face_detected,
        detection.message
    );

    Ok(())
}
