//! MobiPay CLI - a mobile-money wallet in your terminal

use std::collections::HashMap;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;
mod output;

use commands::money::Movement;
use commands::{account, admin, backup, config, doctor, encrypt, init, logs, money, status};
use mobipay_core::services::LogEvent;
use mobipay_core::OperationResult;

/// MobiPay - an encrypted mobile-money ledger
#[derive(Parser)]
#[command(name = "mobipay", version, about, long_about = None)]
struct Cli {
    /// Passphrase the stores are encrypted with (prompted when omitted)
    #[arg(long, global = true, env = "MOBIPAY_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up a new data directory and the admin account
    Init {
        /// Derive the store key with Argon2id instead of using the passphrase directly
        #[arg(long)]
        argon2: bool,
    },

    /// Open a new account
    Register {
        /// Phone number identifying the account
        phone: String,
        /// Account holder name
        #[arg(long)]
        name: String,
        #[arg(long)]
        pin: Option<String>,
    },

    /// Check a PIN and show the account
    Login {
        phone: String,
        #[arg(long)]
        pin: Option<String>,
    },

    /// Send money to another account (fee applies)
    Send {
        /// Sender phone number
        phone: String,
        /// Recipient phone number
        to: String,
        amount: Decimal,
        #[arg(long)]
        pin: Option<String>,
    },

    /// Withdraw cash through an agent (fee applies)
    CashOut {
        phone: String,
        amount: Decimal,
        #[arg(long)]
        pin: Option<String>,
    },

    /// Pay a merchant
    Pay {
        phone: String,
        /// Merchant identifier
        merchant: String,
        amount: Decimal,
        #[arg(long)]
        pin: Option<String>,
    },

    /// Recharge a mobile number
    Recharge {
        phone: String,
        /// Number to recharge
        number: String,
        amount: Decimal,
        #[arg(long)]
        pin: Option<String>,
    },

    /// Add money through an agent or bank
    TopUp {
        phone: String,
        amount: Decimal,
        #[arg(long)]
        pin: Option<String>,
    },

    /// Show the account balance
    Balance {
        phone: String,
        #[arg(long)]
        pin: Option<String>,
    },

    /// Show the account's transactions
    History {
        phone: String,
        #[arg(long)]
        pin: Option<String>,
        /// Only show the most recent N transactions
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Change the account PIN
    ChangePin {
        phone: String,
        /// Current PIN
        #[arg(long)]
        pin: Option<String>,
        #[arg(long)]
        new_pin: Option<String>,
    },

    /// Admin panel
    Admin {
        #[command(subcommand)]
        command: admin::AdminCommands,
    },

    /// Show ledger status and summary
    Status,

    /// Run ledger health checks
    Doctor {
        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
    },

    /// Manage backups
    Backup {
        #[command(subcommand)]
        command: backup::BackupCommands,
    },

    /// View and change settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },

    /// Inspect store encryption
    Encrypt {
        #[command(subcommand)]
        command: encrypt::EncryptCommands,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    /// Name recorded in the event log
    fn name(&self) -> &'static str {
        match self {
            Commands::Init { .. } => "init",
            Commands::Register { .. } => "register",
            Commands::Login { .. } => "login",
            Commands::Send { .. } => "send",
            Commands::CashOut { .. } => "cash_out",
            Commands::Pay { .. } => "pay",
            Commands::Recharge { .. } => "recharge",
            Commands::TopUp { .. } => "top_up",
            Commands::Balance { .. } => "balance",
            Commands::History { .. } => "history",
            Commands::ChangePin { .. } => "change_pin",
            Commands::Admin { .. } => "admin",
            Commands::Status => "status",
            Commands::Doctor { .. } => "doctor",
            Commands::Backup { .. } => "backup",
            Commands::Config { .. } => "config",
            Commands::Encrypt { .. } => "encrypt",
            Commands::Logs { .. } => "logs",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.json;
    let command = cli.command.name();

    let logger = commands::get_logger();
    commands::log_event(
        &logger,
        LogEvent::new(format!("{}_started", command)).with_command(command),
    );

    match run(cli) {
        Ok(()) => {
            commands::log_event(
                &logger,
                LogEvent::new(format!("{}_completed", command)).with_command(command),
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            let kind = commands::error_kind(&e);
            commands::log_event(
                &logger,
                LogEvent::new(format!("{}_failed", command))
                    .with_command(command)
                    .with_error(kind.clone()),
            );
            if json {
                let context = HashMap::from([("errorKind".to_string(), kind.into())]);
                let failure = OperationResult::<()>::fail_with_context(format!("{:#}", e), context);
                match serde_json::to_string_pretty(&failure) {
                    Ok(s) => println!("{}", s),
                    Err(_) => output::error(&format!("{:#}", e)),
                }
            } else {
                output::error(&format!("{:#}", e));
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let passphrase = cli.passphrase.as_deref();
    let json = cli.json;

    match cli.command {
        Commands::Init { argon2 } => init::run(passphrase, argon2, json),
        Commands::Register { phone, name, pin } => {
            account::register(passphrase, &phone, &name, pin, json)
        }
        Commands::Login { phone, pin } => account::login(passphrase, &phone, pin, json),
        Commands::Send { phone, to, amount, pin } => {
            money::run(passphrase, &phone, Movement::Send { to: &to }, amount, pin, json)
        }
        Commands::CashOut { phone, amount, pin } => {
            money::run(passphrase, &phone, Movement::CashOut, amount, pin, json)
        }
        Commands::Pay { phone, merchant, amount, pin } => money::run(
            passphrase,
            &phone,
            Movement::Pay { merchant: &merchant },
            amount,
            pin,
            json,
        ),
        Commands::Recharge { phone, number, amount, pin } => money::run(
            passphrase,
            &phone,
            Movement::Recharge { number: &number },
            amount,
            pin,
            json,
        ),
        Commands::TopUp { phone, amount, pin } => {
            money::run(passphrase, &phone, Movement::TopUp, amount, pin, json)
        }
        Commands::Balance { phone, pin } => account::balance(passphrase, &phone, pin, json),
        Commands::History { phone, pin, limit } => {
            account::history(passphrase, &phone, pin, limit, json)
        }
        Commands::ChangePin { phone, pin, new_pin } => {
            account::change_pin(passphrase, &phone, pin, new_pin, json)
        }
        Commands::Admin { command } => admin::run(command, passphrase, json),
        Commands::Status => status::run(passphrase, json),
        Commands::Doctor { verbose } => doctor::run(passphrase, verbose, json),
        Commands::Backup { command } => backup::run(command, json),
        Commands::Config { command } => config::run(command, json),
        Commands::Encrypt { command } => encrypt::run(command, json),
        Commands::Logs { command } => logs::run(command, json),
    }
}
