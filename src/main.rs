use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use evm_utils::{
    config::Config,
    dispatch::{ContractWriter, Dispatch},
    ethereum::{abi::KeyedFunction, LocalWallet, RpcReader},
    network::{Network, NetworkRegistry},
    Outcome, Session,
};
use std::collections::BTreeSet;
use tracing::{error, info};
use url::Url;

fn function_args() -> [Arg; 2] {
    [
        Arg::new("function")
            .required(true)
            .value_name("FUNCTION")
            .help("Function name, or full signature for overloaded functions"),
        Arg::new("args")
            .num_args(0..)
            .value_name("ARGS")
            .allow_hyphen_values(true)
            .help("Raw input values in parameter order"),
    ]
}

fn cli() -> Command {
    Command::new("evm-utils")
        .version("0.1.0")
        .about("Inspect and call smart contract functions from an ABI")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Path to configuration file"),
        )
        .arg(
            Arg::new("network")
                .short('n')
                .long("network")
                .value_name("CHAIN_ID")
                .value_parser(value_parser!(u64).range(1..))
                .global(true)
                .help("Chain id of the network to use"),
        )
        .arg(
            Arg::new("address")
                .short('a')
                .long("address")
                .value_name("ADDRESS")
                .global(true)
                .help("Contract address"),
        )
        .arg(
            Arg::new("abi")
                .long("abi")
                .value_name("FILE")
                .global(true)
                .help("Path to the contract ABI JSON"),
        )
        .arg(
            Arg::new("session")
                .short('s')
                .long("session")
                .value_name("URL")
                .global(true)
                .help("Share link to restore network, address and ABI from"),
        )
        .arg(
            Arg::new("chain-id")
                .long("chain-id")
                .value_name("CHAIN_ID")
                .value_parser(value_parser!(u64).range(1..))
                .requires_all(["chain-name", "rpc-url"])
                .global(true)
                .help("Register and select a custom network"),
        )
        .arg(
            Arg::new("chain-name")
                .long("chain-name")
                .value_name("NAME")
                .global(true)
                .help("Display name of the custom network"),
        )
        .arg(
            Arg::new("rpc-url")
                .long("rpc-url")
                .value_name("URL")
                .global(true)
                .help("RPC endpoint of the custom network"),
        )
        .arg(
            Arg::new("explorer-url")
                .long("explorer-url")
                .value_name("URL")
                .global(true)
                .help("Block explorer of the custom network"),
        )
        .arg(
            Arg::new("allow-writes")
                .long("allow-writes")
                .help("Allow write operations (transactions)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a sample configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-path")
                .long("config-path")
                .help("Print the default configuration file path and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(Command::new("inspect").about("List read and write functions"))
        .subcommand(
            Command::new("call")
                .about("Query a read function over JSON-RPC")
                .args(function_args()),
        )
        .subcommand(
            Command::new("send")
                .about("Send a transaction to a write function")
                .args(function_args()),
        )
        .subcommand(
            Command::new("share")
                .about("Print a share link for the current session")
                .arg(
                    Arg::new("select")
                        .long("select")
                        .value_name("FUNCTION")
                        .num_args(1..)
                        .help("Only include these functions"),
                ),
        )
        .subcommand(
            Command::new("networks").about("List known networks").arg(
                Arg::new("check")
                    .long("check")
                    .help("Probe each RPC endpoint")
                    .action(clap::ArgAction::SetTrue),
            ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, command output to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let matches = cli().get_matches();

    if matches.get_flag("generate-config") {
        println!("{}", Config::generate_sample());
        return Ok(());
    }

    if matches.get_flag("config-path") {
        match Config::default_config_path() {
            Ok(path) => {
                println!("{}", path.display());
                return Ok(());
            }
            Err(e) => {
                error!("Could not determine default config path: {}", e);
                return Err(e);
            }
        }
    }

    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let mut config = Config::load_or_default(config_path).await;
    if matches.get_flag("allow-writes") {
        config.wallet.allow_write_operations = true;
    }

    let mut session = build_session(&config, &matches).await?;

    match matches.subcommand() {
        Some(("call", sub)) => call(&session, sub).await,
        Some(("send", sub)) => send(&mut session, &config, sub).await,
        Some(("share", sub)) => share(&mut session, &config, sub),
        Some(("networks", sub)) => {
            print_networks(&session, sub.get_flag("check")).await;
            Ok(())
        }
        _ => {
            print_functions(&session);
            Ok(())
        }
    }
}

async fn build_session(config: &Config, matches: &ArgMatches) -> Result<Session> {
    let mut registry: NetworkRegistry = config.network_registry();

    let custom_chain = matches.get_one::<u64>("chain-id").copied();
    if let Some(id) = custom_chain {
        if !registry.contains(id) {
            let network = Network {
                id,
                name: required(matches, "chain-name")?,
                rpc_url: required(matches, "rpc-url")?,
                explorer_url: matches.get_one::<String>("explorer-url").cloned(),
            };
            registry.register(network)?;
        }
    }

    let link = matches.get_one::<String>("session");
    let mut session = match link {
        Some(link) => {
            let url = Url::parse(link).map_err(|e| anyhow!("Invalid session link: {}", e))?;
            Session::from_url(registry, &url)
        }
        None => Session::new(registry),
    };

    let fallback = if link.is_none() {
        config.default_network
    } else {
        None
    };
    let requested = matches
        .get_one::<u64>("network")
        .copied()
        .or(custom_chain)
        .or(fallback);
    if let Some(id) = requested {
        if !session.select_network(id) {
            return Err(anyhow!(
                "Unknown network: {}. Register it with --chain-id, --chain-name and --rpc-url",
                id
            ));
        }
    }

    if let Some(address) = matches.get_one::<String>("address") {
        session.set_contract_address(address.clone());
    }

    if let Some(path) = matches.get_one::<String>("abi") {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read ABI file {}: {}", path, e))?;
        session
            .set_abi_text(text)
            .map_err(|e| anyhow!("Failed to load ABI from {}: {}", path, e))?;
    }

    info!(
        "Using {} (chain ID {})",
        session.selected_network().name,
        session.selected_network().id
    );
    Ok(session)
}

fn required(matches: &ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .ok_or_else(|| anyhow!("--{} is required", name))
}

async fn fill_inputs(session: &Session, matches: &ArgMatches) -> Result<String> {
    let function = required(matches, "function")?;
    if let Some(args) = matches.get_many::<String>("args") {
        for (index, value) in args.enumerate() {
            session.set_input(&function, index, value.clone()).await;
        }
    }
    Ok(function)
}

async fn call(session: &Session, matches: &ArgMatches) -> Result<()> {
    let function = fill_inputs(session, matches).await?;
    let reader = RpcReader::new(session.selected_network())?;

    match session.dispatch_read(&function, Some(&reader)).await {
        Dispatch::Completed(outcome) => report(&function, &outcome),
        Dispatch::Skipped => Err(anyhow!(
            "Nothing to call: provide --address and an ABI containing '{}'",
            function
        )),
    }
}

fn report(function: &str, outcome: &Outcome) -> Result<()> {
    println!("{}", outcome);
    if outcome.is_success() {
        Ok(())
    } else {
        Err(anyhow!("Call to {} failed", function))
    }
}

async fn send(session: &mut Session, config: &Config, matches: &ArgMatches) -> Result<()> {
    if !config.wallet.allow_write_operations {
        return Err(anyhow!(
            "Write operations are disabled. Use --allow-writes flag to enable transaction sending."
        ));
    }

    let wallet = config
        .wallet
        .private_key
        .as_deref()
        .map(LocalWallet::from_private_key)
        .transpose()?;

    if let Some(wallet) = &wallet {
        let chain_id = session.selected_network().id;
        session.switch_network(chain_id, wallet).await?;
    }

    let function = fill_inputs(session, matches).await?;
    let writer = wallet.as_ref().map(|w| w as &dyn ContractWriter);
    let outcome = session.dispatch_write(&function, writer).await?;
    report(&function, &outcome)
}

fn share(session: &mut Session, config: &Config, matches: &ArgMatches) -> Result<()> {
    let base = config.share_base_url()?;

    if let Some(selected) = matches.get_many::<String>("select") {
        let selected: BTreeSet<&String> = selected.collect();
        let all = session.begin_share().clone();
        for key in all.iter().filter(|key| !selected.contains(key)) {
            session.set_shared(key, false);
        }
    }

    let url = session.confirm_share(&base)?;
    println!("{}", url);
    Ok(())
}

fn print_functions(session: &Session) {
    let abi = session.abi();
    if abi.document().is_none() {
        println!("No ABI loaded. Pass --abi <FILE> or --session <URL>.");
        return;
    }

    println!("Read Contract ({})", abi.read_functions().len());
    for function in abi.read_functions() {
        println!("  {}", describe(function));
    }
    println!("Write Contract ({})", abi.write_functions().len());
    for function in abi.write_functions() {
        println!("  {}", describe(function));
    }
}

fn describe(keyed: &KeyedFunction) -> String {
    let function = &keyed.function;
    let inputs: Vec<String> = function
        .inputs
        .iter()
        .enumerate()
        .map(|(i, param)| format!("{} {}", param.ty, function.input_label(i)))
        .collect();
    let outputs: Vec<&str> = function.outputs.iter().map(|p| p.ty.as_str()).collect();

    let mut line = format!("{}({})", keyed.key, inputs.join(", "));
    if !outputs.is_empty() {
        line.push_str(&format!(" -> ({})", outputs.join(", ")));
    }
    if function.is_payable() {
        line.push_str(" [payable]");
    }
    line
}

async fn print_networks(session: &Session, check: bool) {
    let registry = session.registry();
    let selected = session.selected_network().id;
    for network in registry.networks() {
        let marker = if network.id == selected { "*" } else { " " };
        let kind = if registry.is_custom(network) { " (custom)" } else { "" };
        let status = if check {
            match RpcReader::new(network) {
                Ok(reader) if reader.check_connection().await => "  [ok]",
                _ => "  [unreachable]",
            }
        } else {
            ""
        };
        println!(
            "{} {:>8}  {}{}  {}{}",
            marker, network.id, network.name, kind, network.rpc_url, status
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_ids_must_be_positive() {
        let custom = cli().try_get_matches_from([
            "evm-utils",
            "--chain-id",
            "0",
            "--chain-name",
            "Zero",
            "--rpc-url",
            "http://127.0.0.1:8545",
            "networks",
        ]);
        assert!(custom.is_err());

        assert!(cli()
            .try_get_matches_from(["evm-utils", "--network", "0", "inspect"])
            .is_err());

        let matches = cli()
            .try_get_matches_from([
                "evm-utils",
                "--chain-id",
                "31337",
                "--chain-name",
                "Anvil",
                "--rpc-url",
                "http://127.0.0.1:8545",
                "networks",
            ])
            .unwrap();
        assert_eq!(matches.get_one::<u64>("chain-id"), Some(&31337));
    }

    #[tokio::test]
    async fn test_custom_network_is_registered_and_selected() {
        let matches = cli()
            .try_get_matches_from([
                "evm-utils",
                "--chain-id",
                "31337",
                "--chain-name",
                "Anvil",
                "--rpc-url",
                "http://127.0.0.1:8545",
                "networks",
            ])
            .unwrap();

        let session = build_session(&Config::default(), &matches).await.unwrap();
        assert_eq!(session.selected_network().id, 31337);
        assert!(session.registry().is_custom(session.selected_network()));
    }
}
