use foundry_stream::config::init_env;
use foundry_stream::observability::init_observability;
use foundry_stream::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), FoundryError> {
    init_env();
    init_observability();

    let mut args = std::env::args().skip(1);
    let model1 = args.next().unwrap_or_else(|| "gpt-4o".to_string());
    let model2 = args.next().unwrap_or_else(|| "llama3".to_string());

    let client = FoundryClient::from_env()?;
    let mut stream = client.compare_models(&model1, &model2).await?;

    while let Some(event) = stream.next_event().await {
        match event {
            StreamEvent::Payload { payload, .. } => match ComparisonProgress::from_payload(&payload) {
                Some(progress) => {
                    let pct = progress
                        .progress_fraction()
                        .map(|f| format!("{:>5.1}%", f * 100.0))
                        .unwrap_or_else(|| "   --".to_string());
                    println!(
                        "{pct} {} {}",
                        progress.status.as_deref().unwrap_or("-"),
                        progress.message.as_deref().unwrap_or("")
                    );
                }
                None => println!("{}", payload.display_text()),
            },
            StreamEvent::Finished { reason, .. } => println!("finished: {reason:?}"),
            StreamEvent::Failed { error, .. } => eprintln!("stream error: {error}"),
            StreamEvent::Opened { .. } => {}
        }
    }

    stream.finish().await?;
    Ok(())
}
