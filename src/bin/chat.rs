//! Terminal chat client for a running ask-my-race server: loads a guide,
//! shows the parsed schedule and venues, then answers questions with
//! citations in a read-eval loop.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use askmyrace::client::ApiClient;
use askmyrace::conversation::ConversationState;
use askmyrace::guard;
use askmyrace::history;
use askmyrace::models::UploadResponse;
use askmyrace::schedule;

#[derive(Parser, Debug)]
#[command(name = "chat")]
#[command(about = "Chat with a triathlon athlete guide through an ask-my-race server")]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server: String,
    /// Path of a local athlete-guide PDF to upload.
    #[arg(long)]
    pdf: Option<PathBuf>,
    /// Slug of a bundled example guide to load instead.
    #[arg(long)]
    example: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let api = ApiClient::new(cli.server.clone());

    let upload = match (&cli.pdf, &cli.example) {
        (Some(path), _) => api.upload(path).await?,
        (None, Some(slug)) => api.load_example(slug).await?,
        (None, None) => {
            print_example_listing(&api).await?;
            return Ok(());
        }
    };

    print_guide_summary(&upload);

    let mut state = ConversationState::new();
    state.upload_success(upload);

    println!("Ask a question, or use /locations, /reset, /quit.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let input = line?.trim().to_string();
        if input.is_empty() {
            continue;
        }

        match input.as_str() {
            "/quit" => break,
            "/reset" => {
                state.reset();
                println!("Conversation cleared.");
                continue;
            }
            "/locations" => {
                if let Some(document) = state.document() {
                    print_locations(&document.schedule);
                }
                continue;
            }
            _ => {}
        }

        if let Err(rejection) = guard::validate_question(&input) {
            println!("{}", rejection.message());
            continue;
        }

        let Some(document_id) = state.document_id().map(str::to_string) else {
            println!("No guide is loaded.");
            continue;
        };

        let context = history::build_history(state.messages(), &input);
        match api.ask(&document_id, &input, context).await {
            Ok(response) => {
                println!("\n{}\n", response.answer);
                state.ask_success(input, response.answer, Some(response.citations));
                if let Some(citations) = state
                    .messages()
                    .last()
                    .and_then(|message| message.citations.as_ref())
                {
                    for citation in citations {
                        println!("  [{} - p.{}]", citation.section, citation.page);
                    }
                    if !citations.is_empty() {
                        println!();
                    }
                }
            }
            // a failed ask changes nothing; the question can be retried
            Err(err) => println!("{err:#}"),
        }
    }

    Ok(())
}

async fn print_example_listing(api: &ApiClient) -> Result<()> {
    let guides = api.list_examples().await?;
    if guides.is_empty() {
        println!("No example guides available. Pass --pdf <file> to upload one.");
        return Ok(());
    }

    println!("Available example guides (load one with --example <slug>):");
    for guide in guides {
        println!("  {:<28} {}", guide.slug, guide.name);
    }
    Ok(())
}

fn print_guide_summary(upload: &UploadResponse) {
    println!(
        "Loaded {} ({} pages, document {}).",
        upload.filename, upload.page_count, upload.document_id
    );

    if upload.schedule.is_empty() {
        println!("No schedule was found in this guide.");
        return;
    }

    for day in &upload.schedule {
        println!("\n{}", day.title);
        for item in &day.items {
            match &item.location {
                Some(location) => println!("  {:<14} {} @ {}", item.time, item.activity, location),
                None => println!("  {:<14} {}", item.time, item.activity),
            }
        }
    }

    print_locations(&upload.schedule);
}

fn print_locations(schedule: &[askmyrace::models::ScheduleDay]) {
    let venues = schedule::derive_locations(schedule);
    if venues.is_empty() {
        println!("\nNo venues could be inferred from the schedule.");
        return;
    }

    println!("\nVenues:");
    for venue in venues {
        println!("  - {venue}");
    }
}
