/*
┌─────────────────────────────────────────────────────────────────────────────┐
│                              IAC AGENT WORKFLOW                              │
└─────────────────────────────────────────────────────────────────────────────┘

  VALIDATE REQUIREMENTS ──NOT_VALID──> exit 1 (gate errors printed)
         │ VALID
         ↓
  GENERATE FILES ──> WRITE FILES TO DISK ──> VALIDATE FILES ──pass──> FINALIZE (exit 0)
                           ↑                       │
                           │                       │ fail
                           │                       ↓
                           └──── FIX VALIDATION ERRORS (at most 3 times)
                                                   │
                                                   └── ceiling reached ──> FINALIZE (exit 2)

EXAMPLE COMMANDS:

  # Inline requirements
  iac-agent --input "An EC2 web server behind a security group allowing HTTP"

  # Requirements from a file, custom output directory
  iac-agent --input-file requirements.txt --output-dir build/tf

  # OpenTofu instead of Terraform, two repair attempts
  iac-agent --validator tofu --max-attempts 2 < requirements.txt

  # Print workflow metadata for a workflow manager
  iac-agent --workflow-metadata
*/

use clap::Parser;
use futures::StreamExt;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use iac_agent::iac::cli::Args;
use iac_agent::iac::{ConsoleObserver, EventLogObserver, IacWorkflow, ProgressEvent, Terminal};
use iac_agent_sdk::{log_error, log_warning, WorkflowDefinition};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    // Handle workflow metadata flag
    if args.workflow_metadata {
        args.print_metadata();
        return Ok(ExitCode::SUCCESS);
    }

    let config = args.load_config().await?;
    let requirement = args.read_requirement().await?;

    let workflow = IacWorkflow::from_config(config)?
        .with_observer(Arc::new(EventLogObserver))
        .with_observer(Arc::new(ConsoleObserver::new()));

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log_warning!("Interrupted, cancelling workflow");
            ctrl_c_token.cancel();
        }
    });

    let mut terminal = None;
    let mut events = Box::pin(workflow.process(requirement, cancel));
    while let Some(event) = events.next().await {
        match event {
            Ok(event @ ProgressEvent::NodeCompleted { .. }) => println!("{}", event),
            Ok(event @ ProgressEvent::Finished { terminal: t, .. }) => {
                terminal = Some(t);
                println!("{}", event);
            }
            Err(e) => {
                log_error!("{}", e);
                return Err(e.into());
            }
        }
    }

    Ok(match terminal {
        Some(Terminal::Succeeded) => ExitCode::SUCCESS,
        Some(Terminal::Rejected) => ExitCode::from(1),
        Some(Terminal::Exhausted) | None => ExitCode::from(2),
    })
}
