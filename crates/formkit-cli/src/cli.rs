use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use formkit_core::VERSION;

/// Formkit - custom fields, dependency rules and form templates for business modules
#[derive(Parser)]
#[command(name = "formkit")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the store file
    #[arg(short, long, global = true, env = "FORMKIT_STORE")]
    pub store: Option<String>,

    /// Act on behalf of this owner (tenant id)
    #[arg(long, global = true, env = "FORMKIT_OWNER")]
    pub owner: Option<i64>,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format (table, plain)
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Use ASCII symbols only
    #[arg(long, global = true)]
    pub ascii: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new store and write the config file
    Init(InitArgs),

    /// Manage custom field definitions
    #[command(subcommand)]
    Field(FieldSubcommand),

    /// Manage field dependency rules
    #[command(subcommand)]
    Rule(RuleSubcommand),

    /// Manage form templates
    #[command(subcommand)]
    Template(TemplateSubcommand),

    /// Manage per-module field configuration
    #[command(subcommand)]
    Config(ConfigSubcommand),

    /// Resolve the fields of a module's form, list or detail view
    Resolve(ResolveArgs),

    /// Evaluate dependency rules against a set of values
    Evaluate(FormValuesArgs),

    /// Validate a set of values against a module's form
    Validate(FormValuesArgs),

    /// Validate values and store the custom ones for an entity
    Submit(SubmitArgs),

    /// Read and write stored custom field values
    #[command(subcommand)]
    Values(ValuesSubcommand),

    /// List the modules and their built-in fields
    Modules(ModulesArgs),

    /// Check store integrity
    Check,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Path where the store will be created
    #[arg(value_name = "PATH")]
    pub path: Option<String>,

    /// Config path override
    #[arg(long)]
    pub config_path: Option<String>,

    /// Default owner written to the config file
    #[arg(long)]
    pub default_owner: Option<i64>,
}

/// Which template a command resolves against
#[derive(Args, Clone)]
pub struct SelectionArgs {
    /// Template id to use
    #[arg(short, long, value_name = "ID", conflicts_with = "preferred")]
    pub template: Option<String>,

    /// Use the owner's default template, then the shared default
    #[arg(long)]
    pub preferred: bool,
}

#[derive(Subcommand)]
pub enum FieldSubcommand {
    /// List field definitions
    List(FieldListArgs),

    /// Define a new custom field
    Add(FieldAddArgs),

    /// Show a field definition
    Show(FieldKeyArgs),

    /// Update a field definition
    Update(FieldUpdateArgs),

    /// Hide a field from new forms without losing its values
    Deactivate(FieldKeyArgs),

    /// Re-activate a deactivated field
    Activate(FieldKeyArgs),

    /// Delete a field definition
    Delete(FieldDeleteArgs),
}

/// Arguments for `field list`
#[derive(Args)]
pub struct FieldListArgs {
    /// Only fields in scope for this module
    #[arg(short, long)]
    pub module: Option<String>,

    /// Include inactive fields
    #[arg(long)]
    pub all: bool,
}

/// Arguments naming a single field
#[derive(Args)]
pub struct FieldKeyArgs {
    /// Field key
    #[arg(value_name = "KEY")]
    pub key: String,
}

/// Arguments for `field add`
#[derive(Args)]
pub struct FieldAddArgs {
    /// Field key (letters, digits, '_', '-', '.')
    #[arg(value_name = "KEY")]
    pub key: String,

    /// Module the field belongs to, or "global"
    #[arg(short, long)]
    pub module: String,

    /// Display label (defaults to the key)
    #[arg(short, long)]
    pub label: Option<String>,

    /// Field type (text, number, date, select, boolean, textarea, signature, image)
    #[arg(short = 't', long = "type", default_value = "text")]
    pub field_type: String,

    /// Select option as LABEL=VALUE (repeatable)
    #[arg(short, long = "option", value_name = "LABEL=VALUE")]
    pub options: Vec<String>,

    /// Mark the field as required
    #[arg(long)]
    pub required: bool,

    /// Minimum numeric value
    #[arg(long, allow_negative_numbers = true)]
    pub min: Option<f64>,

    /// Maximum numeric value
    #[arg(long, allow_negative_numbers = true)]
    pub max: Option<f64>,

    /// Regex the value must match
    #[arg(long)]
    pub pattern: Option<String>,

    /// Default value (JSON, or a bare string)
    #[arg(long)]
    pub default: Option<String>,

    /// Protect the field from deactivation and deletion
    #[arg(long)]
    pub system: bool,

    /// Restrict the field to the current owner
    #[arg(long)]
    pub private: bool,
}

/// Arguments for `field update`
#[derive(Args)]
pub struct FieldUpdateArgs {
    /// Field key
    #[arg(value_name = "KEY")]
    pub key: String,

    /// New key
    #[arg(long)]
    pub rename: Option<String>,

    /// New label
    #[arg(short, long)]
    pub label: Option<String>,

    /// New type
    #[arg(short = 't', long = "type")]
    pub field_type: Option<String>,

    /// Replace the select options (repeatable LABEL=VALUE)
    #[arg(short, long = "option", value_name = "LABEL=VALUE")]
    pub options: Vec<String>,

    /// Mark the field as required
    #[arg(long, conflicts_with = "optional")]
    pub required: bool,

    /// Mark the field as optional
    #[arg(long)]
    pub optional: bool,

    /// Minimum numeric value
    #[arg(long, allow_negative_numbers = true)]
    pub min: Option<f64>,

    /// Maximum numeric value
    #[arg(long, allow_negative_numbers = true)]
    pub max: Option<f64>,

    /// Regex the value must match
    #[arg(long)]
    pub pattern: Option<String>,

    /// Drop min, max and pattern before applying new ones
    #[arg(long)]
    pub clear_constraints: bool,

    /// New default value (JSON, or a bare string)
    #[arg(long, conflicts_with = "clear_default")]
    pub default: Option<String>,

    /// Remove the default value
    #[arg(long)]
    pub clear_default: bool,
}

/// Arguments for `field delete`
#[derive(Args)]
pub struct FieldDeleteArgs {
    /// Field key
    #[arg(value_name = "KEY")]
    pub key: String,

    /// Also delete stored values and rules referencing the field
    #[arg(long)]
    pub cascade: bool,
}

#[derive(Subcommand)]
pub enum RuleSubcommand {
    /// Add a dependency rule
    Add(RuleAddArgs),

    /// List dependency rules
    List(RuleListArgs),

    /// Remove a dependency rule
    Remove(RuleRemoveArgs),
}

/// Arguments for `rule add`
#[derive(Args)]
pub struct RuleAddArgs {
    /// Key of the field the rule controls
    #[arg(long)]
    pub field: String,

    /// Key of the controlling field
    #[arg(long)]
    pub depends_on: String,

    /// Condition (equals, not_equals, greater_than, less_than, contains, in, not_in, is_empty, is_not_empty)
    #[arg(short, long)]
    pub condition: String,

    /// Condition value (JSON, or a bare string)
    #[arg(long)]
    pub value: Option<String>,

    /// Action (show, hide, enable, disable, set_required, set_optional)
    #[arg(short, long)]
    pub action: String,
}

/// Arguments for `rule list`
#[derive(Args)]
pub struct RuleListArgs {
    /// Only rules controlling this field
    #[arg(long)]
    pub field: Option<String>,
}

/// Arguments for `rule remove`
#[derive(Args)]
pub struct RuleRemoveArgs {
    /// Rule id
    #[arg(value_name = "ID")]
    pub id: u64,
}

#[derive(Subcommand)]
pub enum TemplateSubcommand {
    /// Create a form template
    Create(TemplateCreateArgs),

    /// List templates for a module
    List(TemplateListArgs),

    /// Show a template
    Show(TemplateIdArgs),

    /// Update a template
    Update(TemplateUpdateArgs),

    /// Delete a template
    Delete(TemplateIdArgs),

    /// Make a template the default for its module and owner
    SetDefault(TemplateIdArgs),

    /// Clear the default template of a module
    ClearDefault(TemplateClearDefaultArgs),

    /// Deactivate a template
    Deactivate(TemplateIdArgs),
}

/// Arguments for `template create`
#[derive(Args)]
pub struct TemplateCreateArgs {
    /// Template name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Module the template customizes
    #[arg(short, long)]
    pub module: String,

    /// Description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Custom field key to include (repeatable, in order)
    #[arg(short = 'f', long = "field", value_name = "KEY")]
    pub custom_fields: Vec<String>,

    /// List column (repeatable, in order)
    #[arg(long = "list-field", value_name = "KEY")]
    pub list_fields: Vec<String>,

    /// Detail group as "TITLE=key1,key2" (repeatable)
    #[arg(long = "detail-group", value_name = "TITLE=KEYS")]
    pub detail_groups: Vec<String>,

    /// JSON file holding an array of base field descriptors
    #[arg(long)]
    pub base_fields: Option<String>,

    /// Make a field required in this template (repeatable)
    #[arg(long = "require", value_name = "KEY")]
    pub require: Vec<String>,

    /// Share the template with every owner
    #[arg(long)]
    pub shared: bool,

    /// Make this the default template
    #[arg(long)]
    pub default: bool,
}

/// Arguments for `template list`
#[derive(Args)]
pub struct TemplateListArgs {
    /// Module name
    #[arg(short, long)]
    pub module: String,

    /// Include inactive templates
    #[arg(long)]
    pub all: bool,
}

/// Arguments naming a single template
#[derive(Args)]
pub struct TemplateIdArgs {
    /// Template id
    #[arg(value_name = "ID")]
    pub id: String,
}

/// Arguments for `template update`
#[derive(Args)]
pub struct TemplateUpdateArgs {
    /// Template id
    #[arg(value_name = "ID")]
    pub id: String,

    /// New name
    #[arg(long)]
    pub name: Option<String>,

    /// New description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Replace the custom fields (repeatable, in order)
    #[arg(short = 'f', long = "field", value_name = "KEY")]
    pub custom_fields: Vec<String>,

    /// Replace the list columns (repeatable, in order)
    #[arg(long = "list-field", value_name = "KEY", conflicts_with = "clear_list_fields")]
    pub list_fields: Vec<String>,

    /// Fall back to the module's list columns
    #[arg(long)]
    pub clear_list_fields: bool,

    /// Replace the detail groups (repeatable "TITLE=key1,key2")
    #[arg(
        long = "detail-group",
        value_name = "TITLE=KEYS",
        conflicts_with = "clear_detail_groups"
    )]
    pub detail_groups: Vec<String>,

    /// Fall back to the module's detail groups
    #[arg(long)]
    pub clear_detail_groups: bool,

    /// Replace the base fields from a JSON file (an empty array restores the built-in list)
    #[arg(long)]
    pub base_fields: Option<String>,
}

/// Arguments for `template clear-default`
#[derive(Args)]
pub struct TemplateClearDefaultArgs {
    /// Module name
    #[arg(short, long)]
    pub module: String,

    /// Clear the shared default instead of the owner's
    #[arg(long)]
    pub shared: bool,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Override how a field is presented
    Set(ConfigSetArgs),

    /// Show the effective configuration of a module
    Show(ConfigShowArgs),

    /// Remove an override row
    Clear(ConfigClearArgs),
}

/// Arguments for `config set`
#[derive(Args)]
pub struct ConfigSetArgs {
    /// Module name
    #[arg(value_name = "MODULE")]
    pub module: String,

    /// Field key
    #[arg(value_name = "FIELD")]
    pub field: String,

    /// Show or hide the field
    #[arg(long)]
    pub visible: Option<bool>,

    /// Allow or forbid edits
    #[arg(long)]
    pub editable: Option<bool>,

    /// Require the field
    #[arg(long)]
    pub required: Option<bool>,

    /// Display position
    #[arg(long, allow_negative_numbers = true)]
    pub order: Option<i32>,

    /// Write the row for every owner
    #[arg(long)]
    pub global: bool,
}

/// Arguments for `config show`
#[derive(Args)]
pub struct ConfigShowArgs {
    /// Module name
    #[arg(value_name = "MODULE")]
    pub module: String,
}

/// Arguments for `config clear`
#[derive(Args)]
pub struct ConfigClearArgs {
    /// Module name
    #[arg(value_name = "MODULE")]
    pub module: String,

    /// Field key
    #[arg(value_name = "FIELD")]
    pub field: String,

    /// Clear the row shared by every owner
    #[arg(long)]
    pub global: bool,
}

/// Arguments for `resolve`
#[derive(Args)]
pub struct ResolveArgs {
    /// Module name
    #[arg(value_name = "MODULE")]
    pub module: String,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// View to resolve (form, list, detail)
    #[arg(long, default_value = "form")]
    pub view: String,
}

/// Arguments for commands taking a module and a set of form values
#[derive(Args)]
pub struct FormValuesArgs {
    /// Module name
    #[arg(value_name = "MODULE")]
    pub module: String,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Value as KEY=VALUE; VALUE is JSON or a bare string (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub values: Vec<String>,

    /// JSON file holding an object of values
    #[arg(long)]
    pub values_file: Option<String>,
}

/// Arguments for `submit`
#[derive(Args)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub form: FormValuesArgs,

    /// Entity id
    #[arg(value_name = "ENTITY_ID")]
    pub entity_id: String,
}

#[derive(Subcommand)]
pub enum ValuesSubcommand {
    /// Show the custom values of an entity
    Get(EntityArgs),

    /// Write custom values of an entity without form validation
    Set(ValuesSetArgs),

    /// Delete every custom value of an entity
    Clear(EntityArgs),
}

/// Arguments naming one entity
#[derive(Args)]
pub struct EntityArgs {
    /// Module (entity type)
    #[arg(value_name = "MODULE")]
    pub module: String,

    /// Entity id
    #[arg(value_name = "ENTITY_ID")]
    pub entity_id: String,
}

/// Arguments for `values set`
#[derive(Args)]
pub struct ValuesSetArgs {
    #[command(flatten)]
    pub entity: EntityArgs,

    /// Value as KEY=VALUE; `null` removes the value (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", required = true)]
    pub values: Vec<String>,
}

/// Arguments for `modules`
#[derive(Args)]
pub struct ModulesArgs {
    /// Show the built-in fields of one module
    #[arg(value_name = "MODULE")]
    pub module: Option<String>,
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
