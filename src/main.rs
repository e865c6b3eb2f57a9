use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use clap::{Parser, Subcommand};
use mailroom::{Config, Listener, MailboxDelivery, Pop3Server, SmtpServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailroom")]
#[command(about = "Flat-file SMTP and POP3 servers")]
struct Args {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the SMTP server
    Smtp {
        /// Address to listen on, overrides the configuration
        #[arg(long)]
        listen: Option<String>,
    },

    /// Run the POP3 server
    Pop3 {
        /// Address to listen on, overrides the configuration
        #[arg(long)]
        listen: Option<String>,
    },

    /// Run both servers
    Serve,

    /// Manage mailbox users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a user and create an empty mailbox
    Add { name: String, password: String },

    /// List registered users
    List,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Smtp { listen } => {
            let addr = listen.unwrap_or_else(|| config.smtp.listen.clone());
            serve_smtp(&config, &addr)?;
        }
        Command::Pop3 { listen } => {
            let addr = listen.unwrap_or_else(|| config.pop3.listen.clone());
            serve_pop3(&config, &addr)?;
        }
        Command::Serve => {
            let smtp_config = config.clone();
            let smtp = thread::Builder::new()
                .name("smtp-listener".to_string())
                .spawn(move || {
                    let addr = smtp_config.smtp.listen.clone();
                    if let Err(e) = serve_smtp(&smtp_config, &addr) {
                        error!("SMTP server failed: {e}");
                    }
                })?;
            serve_pop3(&config, &config.pop3.listen)?;
            let _ = smtp.join();
        }
        Command::User { action } => {
            let store = config.mail_store();
            match action {
                UserAction::Add { name, password } => {
                    store.add_user(&name, &password)?;
                    info!(user = %name, "User added");
                }
                UserAction::List => {
                    for user in store.list_users()? {
                        println!("{user}");
                    }
                }
            }
        }
    }

    Ok(())
}

fn serve_smtp(config: &Config, addr: &str) -> Result<(), Box<dyn Error>> {
    let mut server = SmtpServer::new(&config.hostname, MailboxDelivery::new(config.mail_store()));
    if let Some(max) = config.max_line_bytes {
        server = server.with_line_limit(max);
    }
    let listener = Listener::bind(addr)?.with_accept_poll(config.accept_poll());
    server.serve(listener)?;
    Ok(())
}

fn serve_pop3(config: &Config, addr: &str) -> Result<(), Box<dyn Error>> {
    let mut server = Pop3Server::new(config.mail_store());
    if let Some(max) = config.max_line_bytes {
        server = server.with_line_limit(max);
    }
    let listener = Listener::bind(addr)?.with_accept_poll(config.accept_poll());
    server.serve(listener)?;
    Ok(())
}
