use foundry_stream::config::init_env;
use foundry_stream::observability::init_observability;
use foundry_stream::prelude::*;
use foundry_stream::steps::streaming_lines;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), FoundryError> {
    init_env();
    init_observability();

    let mut args = std::env::args().skip(1);
    let agent_id = args.next().unwrap_or_else(|| "default-agent".to_string());
    let query = args.next().unwrap_or_else(|| "Summarize today's tasks.".to_string());

    let client = FoundryClient::from_env()?;
    let mut stream = client.chat(&ChatRequest::new(agent_id, query)).await?;

    // Redraw the whole step list on every record, like the chat view does.
    let mut log = StepLog::new();
    while let Some(event) = stream.next_event().await {
        match event {
            StreamEvent::Payload { payload, .. } => {
                if log.push_payload(&payload) == 0 {
                    continue;
                }
                println!("--- {} records", log.len());
                for step in log.display() {
                    let indent = "  ".repeat(step.depth);
                    println!("{indent}{} {} [{:?}]", step.display_number, step.name, step.status);
                    for line in streaming_lines(&step.parsed_contents) {
                        println!("{indent}    {line}");
                    }
                }
            }
            StreamEvent::Failed { error, .. } => eprintln!("stream error: {error}"),
            StreamEvent::Opened { .. } | StreamEvent::Finished { .. } => {}
        }
    }

    stream.finish().await?;
    Ok(())
}
