use anyhow::Result;
use colored::Colorize;
use futures::StreamExt;
use llm_broker::config::load_config;
use llm_broker::models::{ChatMessage, ChatRequest};
use llm_broker::optimizer::ExportFormat;
use llm_broker::{build_service, metrics};
use std::io::Write;
use std::path::Path;
use tracing::info;

pub struct GenerateOptions {
    pub prompt: String,
    pub system: Option<String>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub user: Option<String>,
    pub stream: bool,
    pub export: Option<String>,
    pub metrics: bool,
}

pub async fn execute(config_path: &Path, options: GenerateOptions) -> Result<()> {
    let cfg = load_config(config_path)?;
    cfg.require_providers()?;

    // Validate before doing any network work
    let export_format = options
        .export
        .as_deref()
        .map(str::parse::<ExportFormat>)
        .transpose()?;

    let metrics_handle = if options.metrics {
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    let service = build_service(&cfg)?;

    let mut messages = Vec::new();
    if let Some(system) = options.system {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(options.prompt));
    let mut request = ChatRequest::new(options.model.unwrap_or_default(), messages);
    if let Some(user) = options.user {
        request = request.with_user(user);
    }
    let preferred = options.provider.as_deref();

    if options.stream {
        let mut stream = service.process_stream(&request, preferred).await?;
        let mut stdout = std::io::stdout();
        while let Some(chunk) = stream.next().await {
            write!(stdout, "{}", chunk?)?;
            stdout.flush()?;
        }
        writeln!(stdout)?;
    } else {
        let response = service.process(&request, preferred).await?;
        info!(provider = %response.provider, model = %response.model, "Generation finished");

        println!("{}", response.content);
        println!();
        println!(
            "{} {} via {} | {} in / {} out tokens | {} ms | ${:.6}",
            "─".dimmed(),
            response.model.bold(),
            response.provider.cyan(),
            response.usage.input_tokens,
            response.usage.output_tokens,
            response.response_time_ms,
            service.optimizer().summary().total_cost
        );

        let budget = service.optimizer().budget_status();
        if !budget.within_budget {
            println!(
                "{}",
                format!(
                    "Budget alert: {:.0}% of daily, {:.0}% of monthly budget used",
                    budget.daily_ratio * 100.0,
                    budget.monthly_ratio * 100.0
                )
                .red()
            );
        }
    }

    if let Some(format) = export_format {
        println!("{}", service.optimizer().export(format)?);
    }

    if let Some(handle) = metrics_handle {
        println!("{}", handle.render());
    }

    Ok(())
}
