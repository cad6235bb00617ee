use std::{
    env, fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use vaultstake::{
    admin::{AdminGate, Operator},
    assets::{AccountId, Amount, AssetId, TokenVault},
    ledger::StakeLedger,
    rewards::ASSET_SCALE,
};

//==================== State file ====================//

#[derive(Serialize, Deserialize)]
struct StateFile {
    version: u8,
    vault: TokenVault,
    gate: Operator,
    ledger: StakeLedger,
}

fn usage() -> ! {
    eprintln!(
        "Usage:
  vaultstake init                    --root=<account> [--asset=<id>] [--state=<file>]
  vaultstake mint    <account> <amount>            [--asset=<id>]
  vaultstake balance <account>                     [--asset=<id>]
  vaultstake stake   <account> <amount>            [--referrer=<account>] [--now=<unix>]
  vaultstake unstake <account> <amount>            [--now=<unix>]
  vaultstake claim   <account>                     [--now=<unix>]
  vaultstake rewards <account>                     [--now=<unix>]
  vaultstake referrals <account>
  vaultstake earnings  <account>
  vaultstake events                  [--limit=<n>]
  vaultstake pause | unpause         --caller=<account>
  vaultstake set-root <account>      --caller=<account>
  vaultstake sweep    <asset>        --caller=<account>
  vaultstake report

Notes:
  - all commands take --state=<file> (default: ledger.json)
  - amounts are minimal units; 1 token = {ASSET_SCALE} units
  - --now overrides the clock (unix seconds), for replays and tests"
    );
    std::process::exit(1)
}

fn arg_flag(args: &[String], name: &str) -> Option<String> {
    for a in args {
        if let Some(rest) = a.strip_prefix(&format!("--{}=", name)) {
            return Some(rest.to_string());
        }
    }
    None
}

fn require_flag(args: &[String], name: &str) -> String {
    if let Some(v) = arg_flag(args, name) {
        return v;
    }
    eprintln!("error: missing --{name}\n");
    usage();
}

fn fail(err: impl std::fmt::Display) -> ! {
    eprintln!("error: {err}");
    std::process::exit(2)
}

fn state_path(args: &[String]) -> PathBuf {
    arg_flag(args, "state")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("ledger.json"))
}

fn load_state(path: &Path) -> StateFile {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => fail(format!("cannot read {}: {err}", path.display())),
    };
    match serde_json::from_slice(&bytes) {
        Ok(state) => state,
        Err(err) => fail(format!("cannot parse {}: {err}", path.display())),
    }
}

fn save_state(path: &Path, state: &StateFile) {
    let json = match serde_json::to_vec_pretty(state) {
        Ok(json) => json,
        Err(err) => fail(format!("cannot encode state: {err}")),
    };
    if let Err(err) = fs::write(path, json) {
        fail(format!("cannot write {}: {err}", path.display()));
    }
}

fn now_arg(args: &[String]) -> u64 {
    if let Some(raw) = arg_flag(args, "now") {
        match raw.parse() {
            Ok(now) => return now,
            Err(_) => fail("invalid --now (unix seconds)"),
        }
    }
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn parse_amount(raw: &str) -> Amount {
    match raw.parse() {
        Ok(amount) => amount,
        Err(_) => fail(format!("invalid amount: {raw}")),
    }
}

fn asset_arg(args: &[String], state: &StateFile) -> AssetId {
    arg_flag(args, "asset").unwrap_or_else(|| state.vault.staked_asset().clone())
}

fn positional(args: &[String], idx: usize) -> &String {
    match args.get(idx) {
        Some(value) if !value.starts_with("--") => value,
        _ => usage(),
    }
}

//==================== Commands ====================//

fn init_cmd(args: &[String]) {
    let path = state_path(args);
    if path.exists() {
        fail(format!("{} already exists, refusing to overwrite", path.display()));
    }
    let root: AccountId = require_flag(args, "root");
    let asset = arg_flag(args, "asset").unwrap_or_else(|| "STAKE".to_string());
    let state = StateFile {
        version: 1,
        vault: TokenVault::new(asset),
        gate: Operator::new(root.clone()),
        ledger: StakeLedger::new(&root),
    };
    save_state(&path, &state);
    println!("initialized ledger (root={root}) → {}", path.display());
}

fn mint_cmd(args: &[String]) {
    let account = positional(args, 0).clone();
    let amount = parse_amount(positional(args, 1));
    let path = state_path(args);
    let mut state = load_state(&path);
    let asset = asset_arg(args, &state);
    state.vault.mint(&asset, &account, amount);
    save_state(&path, &state);
    println!("minted {amount} {asset} → {account}");
}

fn balance_cmd(args: &[String]) {
    let account = positional(args, 0).clone();
    let state = load_state(&state_path(args));
    let asset = asset_arg(args, &state);
    println!("{}", state.vault.balance_of(&asset, &account));
}

fn stake_cmd(args: &[String]) {
    let account = positional(args, 0).clone();
    let amount = parse_amount(positional(args, 1));
    let referrer = arg_flag(args, "referrer");
    let now = now_arg(args);
    let path = state_path(args);
    let mut state = load_state(&path);
    if let Err(err) = state.ledger.stake(
        &mut state.vault,
        &state.gate,
        &account,
        amount,
        referrer.as_ref(),
        now,
    ) {
        fail(err);
    }
    save_state(&path, &state);
    println!("staked {amount} for {account} (now={now})");
}

fn unstake_cmd(args: &[String]) {
    let account = positional(args, 0).clone();
    let amount = parse_amount(positional(args, 1));
    let now = now_arg(args);
    let path = state_path(args);
    let mut state = load_state(&path);
    if let Err(err) = state.ledger.unstake(&mut state.vault, &account, amount, now) {
        fail(err);
    }
    save_state(&path, &state);
    println!("unstaked {amount} for {account} (now={now})");
}

fn claim_cmd(args: &[String]) {
    let account = positional(args, 0).clone();
    let now = now_arg(args);
    let path = state_path(args);
    let mut state = load_state(&path);
    let reward = match state.ledger.claim(&mut state.vault, &account, now) {
        Ok(reward) => reward,
        Err(err) => fail(err),
    };
    save_state(&path, &state);
    println!("claimed {reward} for {account} (now={now})");
}

fn rewards_cmd(args: &[String]) {
    let account = positional(args, 0).clone();
    let now = now_arg(args);
    let state = load_state(&state_path(args));
    println!("{}", state.ledger.pending_rewards(&account, now));
}

fn referrals_cmd(args: &[String]) {
    let account = positional(args, 0).clone();
    let state = load_state(&state_path(args));
    let downstream = state.ledger.referrals(&account);
    match state.ledger.referrer_of(&account) {
        Some(referrer) => println!("referrer: {referrer}"),
        None => println!("referrer: (none)"),
    }
    println!("referrals ({}):", downstream.len());
    for id in downstream {
        println!("  {id}");
    }
}

fn earnings_cmd(args: &[String]) {
    let account = positional(args, 0).clone();
    let state = load_state(&state_path(args));
    let earnings = state.ledger.total_earnings(&account);
    println!(
        "direct={} referral={} total={}",
        earnings.direct,
        earnings.referral,
        earnings.total()
    );
}

fn events_cmd(args: &[String]) {
    let state = load_state(&state_path(args));
    let events = state.ledger.events();
    let limit = arg_flag(args, "limit")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(events.len());
    let skip = events.len().saturating_sub(limit);
    for event in &events[skip..] {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => fail(err),
        }
    }
}

fn pause_cmd(args: &[String], paused: bool) {
    let caller: AccountId = require_flag(args, "caller");
    let path = state_path(args);
    let mut state = load_state(&path);
    let result = if paused {
        state.gate.pause(&caller)
    } else {
        state.gate.unpause(&caller)
    };
    if let Err(err) = result {
        fail(err);
    }
    save_state(&path, &state);
    println!("deposits {}", if paused { "paused" } else { "resumed" });
}

fn set_root_cmd(args: &[String]) {
    let root = positional(args, 0).clone();
    let caller: AccountId = require_flag(args, "caller");
    let path = state_path(args);
    let mut state = load_state(&path);
    if let Err(err) = state.gate.set_root(&caller, &root) {
        fail(err);
    }
    save_state(&path, &state);
    println!("root account → {root}");
}

fn sweep_cmd(args: &[String]) {
    let asset = positional(args, 0).clone();
    let caller: AccountId = require_flag(args, "caller");
    let path = state_path(args);
    let mut state = load_state(&path);
    let moved = match state.gate.sweep(&caller, &mut state.vault, &asset) {
        Ok(moved) => moved,
        Err(err) => fail(err),
    };
    save_state(&path, &state);
    println!("swept {moved} {asset} → {}", state.gate.root_account());
}

fn report_cmd(args: &[String]) {
    let state = load_state(&state_path(args));
    let staked_asset = state.vault.staked_asset();
    println!("asset: {staked_asset}");
    println!("custody: {}", state.vault.custody_of(staked_asset));
    println!("paused: {}", state.gate.is_paused());
    println!("accounts:");
    for (id, acct) in state.ledger.accounts() {
        println!(
            "  {id}: staked={} active={} staked_at={} last_claim_at={} referrals={}",
            acct.staked_amount,
            acct.active,
            acct.staked_at,
            acct.last_claim_at,
            state.ledger.referral_count(id),
        );
    }
    println!("events: {}", state.ledger.events().len());
    println!("state_root: {}", hex::encode(state.ledger.state_root()));
}

//==================== main ====================//

fn main() {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }
    if args.len() == 1 && (args[0] == "help" || args[0] == "--help" || args[0] == "-h") {
        usage();
    }
    let cmd = args.remove(0);
    match cmd.as_str() {
        "init" => init_cmd(&args),
        "mint" => mint_cmd(&args),
        "balance" => balance_cmd(&args),
        "stake" => stake_cmd(&args),
        "unstake" => unstake_cmd(&args),
        "claim" => claim_cmd(&args),
        "rewards" => rewards_cmd(&args),
        "referrals" => referrals_cmd(&args),
        "earnings" => earnings_cmd(&args),
        "events" => events_cmd(&args),
        "pause" => pause_cmd(&args, true),
        "unpause" => pause_cmd(&args, false),
        "set-root" => set_root_cmd(&args),
        "sweep" => sweep_cmd(&args),
        "report" => report_cmd(&args),
        _ => usage(),
    }
}
