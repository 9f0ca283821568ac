use log::{debug, warn};

use crate::client::ModelRequest;
use crate::error::SummarizerError;
use crate::pipeline::PipelineContext;
use crate::sanitize;

use super::job::{FileTask, Summary};

/// Reads the file and asks the model for its summary.
///
/// Never fails: read errors, model failures and timeouts all come back as an
/// error-marked [`Summary`].
pub async fn summarise_task(ctx: &PipelineContext, task: &FileTask) -> Summary {
    match ctx.config.task_timeout {
        Some(limit) => match tokio::time::timeout(limit, summarise_inner(ctx, task)).await {
            Ok(summary) => summary,
            Err(_) => {
                let err = SummarizerError::Timeout(limit.as_secs());
                warn!("{}: {}", sanitize::redact_path(&task.path), err);
                Summary::failure(task.path.clone(), err.to_string())
            }
        },
        None => summarise_inner(ctx, task).await,
    }
}

async fn summarise_inner(ctx: &PipelineContext, task: &FileTask) -> Summary {
    let content = match tokio::fs::read(&task.path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!("Failed to read {}: {}", task.path.display(), e);
            return Summary::failure(task.path.clone(), format!("failed to read file: {}", e));
        }
    };

    let prompts = &ctx.config.prompts;
    let context = task.render_context(&content);
    let request = ModelRequest::single_turn(
        &prompts.system_prompt,
        &prompts.file_prompt,
        &context,
        &ctx.config.standard_params,
    );

    let text = match ctx.client.summarise(&request).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Error processing file {}: {}", task.path.display(), e);
            return Summary::failure(task.path.clone(), e.to_string());
        }
    };

    let modernisation = match &prompts.file_modernisation_prompt {
        Some(prompt) => {
            let request = ModelRequest::single_turn(
                &prompts.system_prompt,
                prompt,
                &context,
                &ctx.config.standard_params,
            );
            match ctx.client.summarise(&request).await {
                Ok(advice) => Some(advice),
                Err(e) => {
                    warn!(
                        "Modernisation recommendation failed for {}: {}",
                        task.path.display(),
                        e
                    );
                    None
                }
            }
        }
        None => None,
    };

    debug!("Summarised {}", sanitize::redact_path(&task.path));
    Summary::success(task.path.clone(), text, modernisation)
}
