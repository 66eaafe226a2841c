use crate::app::AppContext;
use crate::cli::TemplateIdArgs;
use crate::helpers::parse_template_id;

pub fn handle_deactivate(ctx: &AppContext, args: &TemplateIdArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let template = engine
        .templates()
        .deactivate(&parse_template_id(&args.id)?)?;
    super::report(ctx, "Template deactivated", &template)
}
