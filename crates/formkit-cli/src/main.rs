//! Formkit CLI - custom fields, dependency rules and form templates
//!
//! Command-line front end for the Formkit engine. Every command opens the
//! configured store, runs one engine operation and prints the result as a
//! table, plain `key=value` lines or JSON.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod helpers;
mod output;
mod ui;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::app::AppContext;
use crate::cli::{
    Cli, Commands, ConfigSubcommand, FieldSubcommand, RuleSubcommand, TemplateSubcommand,
    ValuesSubcommand,
};
use crate::commands::{fields, forms, init, misc, module_config, rules, templates, values};
use crate::constants::LOG_ENV;
use crate::errors::{exit_code_for, hint_for};
use crate::ui::print_error;

fn main() {
    let cli = Cli::parse();
    configure_logging(cli.verbose);
    let ctx = AppContext::new(&cli);

    if let Err(e) = run(&ctx, &cli) {
        let hint = hint_for(&e);
        print_error(ctx.ui(), &format!("{:#}", e), hint);
        std::process::exit(exit_code_for(&e));
    }
}

/// Logs go to stderr. `FORMKIT_LOG` takes an `EnvFilter` directive;
/// `--verbose` raises the default from warn to debug.
fn configure_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(ctx: &AppContext, cli: &Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Init(args) => init::handle_init(ctx, args),
        Commands::Field(sub) => match sub {
            FieldSubcommand::List(args) => fields::handle_list(ctx, args),
            FieldSubcommand::Add(args) => fields::handle_add(ctx, args),
            FieldSubcommand::Show(args) => fields::handle_show(ctx, args),
            FieldSubcommand::Update(args) => fields::handle_update(ctx, args),
            FieldSubcommand::Deactivate(args) => fields::handle_deactivate(ctx, args),
            FieldSubcommand::Activate(args) => fields::handle_activate(ctx, args),
            FieldSubcommand::Delete(args) => fields::handle_delete(ctx, args),
        },
        Commands::Rule(sub) => match sub {
            RuleSubcommand::Add(args) => rules::handle_add(ctx, args),
            RuleSubcommand::List(args) => rules::handle_list(ctx, args),
            RuleSubcommand::Remove(args) => rules::handle_remove(ctx, args),
        },
        Commands::Template(sub) => match sub {
            TemplateSubcommand::Create(args) => templates::handle_create(ctx, args),
            TemplateSubcommand::List(args) => templates::handle_list(ctx, args),
            TemplateSubcommand::Show(args) => templates::handle_show(ctx, args),
            TemplateSubcommand::Update(args) => templates::handle_update(ctx, args),
            TemplateSubcommand::Delete(args) => templates::handle_delete(ctx, args),
            TemplateSubcommand::SetDefault(args) => templates::handle_set_default(ctx, args),
            TemplateSubcommand::ClearDefault(args) => templates::handle_clear_default(ctx, args),
            TemplateSubcommand::Deactivate(args) => templates::handle_deactivate(ctx, args),
        },
        Commands::Config(sub) => match sub {
            ConfigSubcommand::Set(args) => module_config::handle_set(ctx, args),
            ConfigSubcommand::Show(args) => module_config::handle_show(ctx, args),
            ConfigSubcommand::Clear(args) => module_config::handle_clear(ctx, args),
        },
        Commands::Resolve(args) => forms::handle_resolve(ctx, args),
        Commands::Evaluate(args) => forms::handle_evaluate(ctx, args),
        Commands::Validate(args) => forms::handle_validate(ctx, args),
        Commands::Submit(args) => forms::handle_submit(ctx, args),
        Commands::Values(sub) => match sub {
            ValuesSubcommand::Get(args) => values::handle_get(ctx, args),
            ValuesSubcommand::Set(args) => values::handle_set(ctx, args),
            ValuesSubcommand::Clear(args) => values::handle_clear(ctx, args),
        },
        Commands::Modules(args) => misc::handle_modules(ctx, args),
        Commands::Check => misc::handle_check(ctx),
        Commands::Completions(args) => misc::handle_completions(args),
    }
}
