use crate::app::AppContext;
use crate::cli::TemplateIdArgs;
use crate::helpers::parse_template_id;

pub fn handle_set_default(ctx: &AppContext, args: &TemplateIdArgs) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let template = engine
        .templates()
        .set_default(&parse_template_id(&args.id)?)?;
    super::report(ctx, "Default template set", &template)
}
