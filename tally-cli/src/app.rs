use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tally_balance::{
    group_friend_balances, group_net_balance, net_balance, personal_only, BalanceSheet,
};
use tally_config::{load_config, TallyConfig};
use tally_core::{
    CurrencyCode, Group, GroupId, SettlementStatus, SplitExpense, SplitId, SplitMethod, UserId,
    UserProfile,
};
use tally_events::{EventBus, EventStream};
use tally_ledger::{LedgerEntry, LedgerQuery, LedgerRepository, WalletLedger};
use tally_settlement::{SettlementService, TransitionOutcome};
use tally_split::{MismatchPolicy, Sharer, SplitDraft};
use tally_store::{SplitRepository, SqliteRepository};
use tracing::{debug, info};

use crate::telemetry::init_tracing;

type Service = SettlementService<SqliteRepository>;

#[derive(Parser)]
#[command(author, version, about = "Tally split ledger CLI")]
pub struct Cli {
    /// Configuration file (defaults to config/default.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database path, overriding the configured one
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register users
    User {
        #[command(subcommand)]
        action: UserCommand,
    },
    /// Register groups
    Group {
        #[command(subcommand)]
        action: GroupCommand,
    },
    /// Create and inspect split expenses
    Split {
        #[command(subcommand)]
        action: SplitCommand,
    },
    /// Move participants through the settlement lifecycle
    Settle {
        #[command(subcommand)]
        action: SettleCommand,
    },
    /// Wallet top-ups, balances and journal
    Wallet {
        #[command(subcommand)]
        action: WalletCommand,
    },
    /// Net balances from a viewer's perspective
    Balance(BalanceArgs),
}

#[derive(Subcommand)]
pub enum UserCommand {
    Add {
        id: UserId,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum GroupCommand {
    Add {
        id: GroupId,
        #[arg(long)]
        name: String,
        #[arg(long = "member", required = true)]
        members: Vec<UserId>,
    },
}

#[derive(Subcommand)]
pub enum SplitCommand {
    Create(SplitCreateArgs),
    List {
        #[arg(long, conflicts_with = "group", required_unless_present = "group")]
        user: Option<UserId>,
        #[arg(long)]
        group: Option<GroupId>,
    },
    Show {
        id: SplitId,
    },
}

#[derive(Args)]
pub struct SplitCreateArgs {
    #[arg(long)]
    payer: UserId,
    /// Defaults to `split.default_currency`
    #[arg(long)]
    currency: Option<CurrencyCode>,
    #[arg(long)]
    total: Decimal,
    #[arg(long, default_value = "equally")]
    method: SplitMethod,
    /// `user` for equal splits, `user=amount` or `user=percentage` otherwise
    #[arg(long = "share", required = true, value_parser = parse_share)]
    shares: Vec<ShareArg>,
    #[arg(long)]
    group: Option<GroupId>,
    #[arg(long)]
    description: Option<String>,
    /// Identifier of the expense record this split belongs to
    #[arg(long)]
    expense: Option<String>,
    /// Overrides `split.mismatch_policy`
    #[arg(long)]
    policy: Option<MismatchPolicy>,
}

#[derive(Subcommand)]
pub enum SettleCommand {
    /// Pay a share instantly from the participant's wallet
    Wallet {
        split: SplitId,
        participant: UserId,
    },
    /// Claim an off-app payment; the actor is the participant
    Request {
        split: SplitId,
        #[arg(long)]
        actor: UserId,
    },
    Approve {
        split: SplitId,
        participant: UserId,
        #[arg(long)]
        actor: UserId,
    },
    Reject {
        split: SplitId,
        participant: UserId,
        #[arg(long)]
        actor: UserId,
    },
}

#[derive(Subcommand)]
pub enum WalletCommand {
    TopUp {
        user: UserId,
        amount: Decimal,
        currency: CurrencyCode,
        /// External payment reference recorded on the journal line
        #[arg(long, default_value = "cli")]
        reference: String,
    },
    Show {
        user: UserId,
    },
    History {
        user: UserId,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Replay the journal and compare it with the stored wallet
    Audit {
        user: UserId,
    },
}

#[derive(Args)]
pub struct BalanceArgs {
    viewer: UserId,
    /// Only the balance against this user
    #[arg(long = "with")]
    counterparty: Option<UserId>,
    /// Restrict to one group's splits
    #[arg(long)]
    group: Option<GroupId>,
}

#[derive(Clone, Debug)]
pub struct ShareArg {
    user_id: UserId,
    value: Option<Decimal>,
}

fn parse_share(raw: &str) -> Result<ShareArg, String> {
    let (user, value) = match raw.split_once('=') {
        Some((user, value)) => {
            let value = Decimal::from_str(value.trim())
                .map_err(|err| format!("invalid share value in '{raw}': {err}"))?;
            (user, Some(value))
        }
        None => (raw, None),
    };
    let user = user.trim();
    if user.is_empty() {
        return Err(format!("share '{raw}' has no user"));
    }
    Ok(ShareArg {
        user_id: UserId::from(user),
        value,
    })
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.database.path = db.clone();
    }
    let _guard = init_tracing(&config.log)?;
    Runtime::open(config)?.execute(cli.command)
}

struct Runtime {
    config: TallyConfig,
    service: Service,
    bus: Arc<EventBus>,
    events: EventStream,
}

impl Runtime {
    fn open(config: TallyConfig) -> Result<Self> {
        let path = &config.database.path;
        let repo = SqliteRepository::with_busy_timeout(path, config.database.busy_timeout())
            .with_context(|| format!("failed to open database {}", path.display()))?;
        let bus = Arc::new(EventBus::new(config.events.capacity));
        let events = bus.subscribe();
        let service = SettlementService::new(Arc::new(repo))
            .with_events(bus.clone())
            .with_mismatch_policy(config.split.mismatch_policy);
        debug!(db = %path.display(), "database ready");
        Ok(Self {
            config,
            service,
            bus,
            events,
        })
    }

    fn repo(&self) -> &SqliteRepository {
        self.service.repository()
    }

    fn execute(mut self, command: Commands) -> Result<()> {
        match command {
            Commands::User { action } => self.user(action),
            Commands::Group { action } => self.group(action),
            Commands::Split { action } => self.split(action),
            Commands::Settle { action } => self.settle(action),
            Commands::Wallet { action } => self.wallet(action),
            Commands::Balance(args) => self.balance(args),
        }?;
        self.drain_events();
        Ok(())
    }

    fn user(&self, action: UserCommand) -> Result<()> {
        match action {
            UserCommand::Add { id, name, email } => {
                let mut profile = UserProfile::new(id, name);
                if let Some(email) = email {
                    profile = profile.with_email(email);
                }
                let profile = self.repo().create_profile(profile)?;
                info!(user = %profile.id, "user registered");
                print_json(&profile)
            }
        }
    }

    fn group(&self, action: GroupCommand) -> Result<()> {
        match action {
            GroupCommand::Add { id, name, members } => {
                for member in &members {
                    self.repo()
                        .get_profile(member)
                        .with_context(|| format!("unknown group member {member}"))?;
                }
                let group = self.repo().create_group(Group::new(id, name, members))?;
                info!(group = %group.id, members = group.member_ids.len(), "group registered");
                print_json(&group)
            }
        }
    }

    fn split(&self, action: SplitCommand) -> Result<()> {
        match action {
            SplitCommand::Create(args) => self.create_split(args),
            SplitCommand::List { user, group } => {
                let splits = match (user, group) {
                    (Some(user), _) => self.repo().splits_for_user(&user)?,
                    (None, Some(group)) => self.repo().splits_for_group(&group)?,
                    (None, None) => bail!("either --user or --group is required"),
                };
                print_json(&splits)
            }
            SplitCommand::Show { id } => print_json(&self.repo().get_split(&id)?),
        }
    }

    fn create_split(&self, args: SplitCreateArgs) -> Result<()> {
        let currency = args
            .currency
            .unwrap_or_else(|| self.config.split.default_currency.clone());
        let mut draft = SplitDraft::new(args.payer, currency, args.method, args.total);
        if let Some(group_id) = args.group {
            let group = self.repo().get_group(&group_id)?;
            if let Some(outsider) = std::iter::once(&draft.paid_by)
                .chain(args.shares.iter().map(|share| &share.user_id))
                .find(|user_id| !group.has_member(user_id))
            {
                bail!("{outsider} is not a member of group {group_id}");
            }
            draft = draft.with_group(group_id);
        }
        for share in args.shares {
            draft = draft.with_sharer(self.sharer(share, args.method)?);
        }
        if let Some(description) = args.description {
            draft = draft.with_description(description);
        }
        if let Some(expense) = args.expense {
            draft = draft.with_original_expense(expense);
        }

        let created = match args.policy {
            Some(policy) => self.service_with_policy(policy).create_split(&draft)?,
            None => self.service.create_split(&draft)?,
        };
        print_json(&json!({
            "split": created.split,
            "warnings": created.warnings,
        }))
    }

    fn service_with_policy(&self, policy: MismatchPolicy) -> Service {
        SettlementService::new(self.service.repository().clone())
            .with_events(self.bus.clone())
            .with_mismatch_policy(policy)
    }

    fn sharer(&self, share: ShareArg, method: SplitMethod) -> Result<Sharer> {
        let profile = self
            .repo()
            .get_profile(&share.user_id)
            .with_context(|| format!("unknown user {}", share.user_id))?;
        let mut sharer = Sharer::new(profile.id, profile.display_name);
        if let Some(email) = profile.email {
            sharer = sharer.with_email(email);
        }
        Ok(match (method, share.value) {
            (SplitMethod::ByAmount, Some(amount)) => sharer.with_amount(amount),
            (SplitMethod::ByPercentage, Some(percentage)) => sharer.with_percentage(percentage),
            (SplitMethod::Equally, Some(_)) => {
                bail!("equal splits take plain user ids, got a value for {}", sharer.user_id)
            }
            (_, None) => sharer,
        })
    }

    fn settle(&self, action: SettleCommand) -> Result<()> {
        let outcome = match action {
            SettleCommand::Wallet { split, participant } => {
                self.service.settle_with_wallet(&split, &participant)?
            }
            SettleCommand::Request { split, actor } => {
                self.service.request_approval(&split, &actor)?
            }
            SettleCommand::Approve {
                split,
                participant,
                actor,
            } => self.service.approve(&split, &participant, &actor)?,
            SettleCommand::Reject {
                split,
                participant,
                actor,
            } => self.service.reject(&split, &participant, &actor)?,
        };
        print_json(&TransitionView::from(outcome))
    }

    fn wallet(&self, action: WalletCommand) -> Result<()> {
        match action {
            WalletCommand::TopUp {
                user,
                amount,
                currency,
                reference,
            } => {
                let profile = self.service.add_funds(&user, amount, &currency, &reference)?;
                print_json(&profile)
            }
            WalletCommand::Show { user } => {
                let profile = self.repo().get_profile(&user)?;
                print_json(&json!({ "user_id": profile.id, "wallet": profile.wallet }))
            }
            WalletCommand::History { user, limit } => {
                let mut query = LedgerQuery::for_user(user).descending();
                if let Some(limit) = limit {
                    query = query.with_limit(limit);
                }
                print_json(&self.repo().query(query)?)
            }
            WalletCommand::Audit { user } => {
                let profile = self.repo().get_profile(&user)?;
                let entries = self.repo().query(LedgerQuery::for_user(user.clone()))?;
                let replayed = WalletLedger::replay_wallet(&user, &entries)?;
                let consistent = replayed == profile.wallet;
                info!(user = %user, entries = entries.len(), consistent, "wallet audited");
                print_json(&json!({
                    "user_id": user,
                    "entries": entries.len(),
                    "consistent": consistent,
                    "stored": profile.wallet,
                    "replayed": replayed,
                }))
            }
        }
    }

    fn balance(&self, args: BalanceArgs) -> Result<()> {
        let BalanceArgs {
            viewer,
            counterparty,
            group,
        } = args;
        match (counterparty, group) {
            (Some(counterparty), Some(group_id)) => {
                let group = self.repo().get_group(&group_id)?;
                let splits = self.repo().splits_for_group(&group_id)?;
                let net = group_net_balance(&splits, &group, &counterparty, &viewer)?;
                print_json(&json!({
                    "viewer": viewer,
                    "counterparty": counterparty,
                    "group_id": group_id,
                    "balances": net,
                }))
            }
            (Some(counterparty), None) => {
                let splits = self.repo().splits_for_user(&viewer)?;
                let net = net_balance(&splits, &counterparty, &viewer);
                print_json(&json!({
                    "viewer": viewer,
                    "counterparty": counterparty,
                    "balances": net,
                }))
            }
            (None, Some(group_id)) => {
                let group = self.repo().get_group(&group_id)?;
                let splits = self.repo().splits_for_group(&group_id)?;
                let friends = group_friend_balances(&splits, &group, &viewer)?;
                print_json(&json!({
                    "viewer": viewer,
                    "group_id": group_id,
                    "friends": friends,
                }))
            }
            (None, None) => {
                let splits = self.repo().splits_for_user(&viewer)?;
                print_json(&BalanceSheet::build(personal_only(&splits), &viewer))
            }
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            debug!(?event, users = ?event.affected_users(), "event published");
        }
    }
}

#[derive(Serialize)]
struct TransitionView {
    split: SplitExpense,
    participant_id: UserId,
    from: SettlementStatus,
    to: SettlementStatus,
    journal: Vec<LedgerEntry>,
}

impl From<TransitionOutcome> for TransitionView {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            split: outcome.split,
            participant_id: outcome.participant_id,
            from: outcome.from,
            to: outcome.to,
            journal: outcome.journal,
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_share_arguments() {
        let plain = parse_share("bob").unwrap();
        assert_eq!(plain.user_id, UserId::from("bob"));
        assert!(plain.value.is_none());

        let valued = parse_share("carol=12.50").unwrap();
        assert_eq!(valued.value, Some(Decimal::new(1250, 2)));

        assert!(parse_share("=5").is_err());
        assert!(parse_share("dave=lots").is_err());
    }

    #[test]
    fn parses_split_create() {
        let cli = Cli::try_parse_from([
            "tally", "--db", "t.db", "split", "create", "--payer", "alice", "--total", "90",
            "--method", "by_amount", "--share", "bob=40", "--share", "carol=50",
        ])
        .unwrap();
        match cli.command {
            Commands::Split {
                action: SplitCommand::Create(args),
            } => {
                assert_eq!(args.method, SplitMethod::ByAmount);
                assert_eq!(args.shares.len(), 2);
                assert!(args.currency.is_none());
            }
            _ => panic!("expected split create"),
        }
    }
}
