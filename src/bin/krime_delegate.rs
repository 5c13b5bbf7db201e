#![deny(warnings)]
#![warn(unused_extern_crates)]
#![allow(clippy::expect_used)]

use clap::{Parser, Subcommand};
use libkrime_delegation::broker::DelegationBroker;
use libkrime_delegation::ccache;
use libkrime_delegation::config::BrokerConfig;
use libkrime_delegation::error::KrbError;
use libkrime_delegation::proto::ServiceTicket;
use libkrime_delegation::token::decode_negotiate_header;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::SystemTime;
use tracing::{error, info};

#[derive(Debug, clap::Parser)]
#[clap(about = "Obtain Kerberos tickets on behalf of users through S4U delegation")]
struct OptParser {
    #[clap(subcommand)]
    command: Opt,
}

#[derive(Debug, Subcommand)]
enum Opt {
    /// Obtain a ticket in the name of a user without their credentials.
    Impersonate {
        #[clap(short, long, env = "KRIME_DELEGATE_CONFIG")]
        config: PathBuf,
        /// The user to act as, in the service's realm when none is given.
        user: String,
        /// Continue to a ticket for this backend service.
        #[clap(short, long)]
        backend: Option<String>,
        /// Where to write the credential cache.
        #[clap(short, long)]
        output: PathBuf,
    },
    /// Exchange a user's negotiate token for a ticket to a backend service.
    Token {
        #[clap(short, long, env = "KRIME_DELEGATE_CONFIG")]
        config: PathBuf,
        /// The Authorization header value, "Negotiate <base64>".
        token: String,
        #[clap(short, long)]
        backend: String,
        #[clap(short, long)]
        output: PathBuf,
    },
    /// List the tickets of a credential cache.
    Show { ccache: Option<String> },
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn print_ticket(ticket: &ServiceTicket) {
    println!("client:  {}", ticket.client());
    println!("service: {}", ticket.service());
    println!("start:   {}", unix_secs(ticket.start_time()));
    println!("end:     {}", unix_secs(ticket.end_time()));
    if let Some(renew) = ticket.renew_until() {
        println!("renew:   {}", unix_secs(renew));
    }
    println!("flags:   {:?}", ticket.flags());
}

fn persist(
    broker: &DelegationBroker,
    ticket: &ServiceTicket,
    output: &Path,
) -> Result<(), KrbError> {
    let (name, value) = broker.persist(ticket, output)?;
    info!(client = %ticket.client(), service = %ticket.service(), "credential cache written");
    println!("{}={}", name, value);
    Ok(())
}

fn load_broker(config: &Path) -> Result<DelegationBroker, KrbError> {
    let cfg = BrokerConfig::parse(config).map_err(|err| {
        error!(?err, config = %config.display(), "unable to load configuration");
        KrbError::ConfigInvalid
    })?;
    DelegationBroker::from_config(&cfg)
}

async fn main_run(opt: Opt) -> Result<(), KrbError> {
    match opt {
        Opt::Impersonate {
            config,
            user,
            backend,
            output,
        } => {
            let broker = load_broker(&config)?;
            let ticket = match backend {
                Some(backend) => broker.impersonate_backend(&user, &backend).await?,
                None => broker.impersonate(&user).await?,
            };
            persist(&broker, &ticket, &output)
        }
        Opt::Token {
            config,
            token,
            backend,
            output,
        } => {
            let broker = load_broker(&config)?;
            let token = decode_negotiate_header(&token)?;
            let ticket = broker.backend_ticket(&token, &backend).await?;
            persist(&broker, &ticket, &output)
        }
        Opt::Show { ccache } => {
            for ticket in ccache::load(ccache.as_deref())? {
                print_ticket(&ticket);
                println!();
            }
            Ok(())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let opt = OptParser::parse();

    tracing_subscriber::fmt().with_writer(io::stderr).init();

    match main_run(opt.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(?err, "{}", err);
            ExitCode::FAILURE
        }
    }
}
