use axum::response::Html;
use std::sync::Arc;
use tera::{Context, Tera};

use crate::error::PollsError;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("polls/index.html", include_str!("../templates/polls/index.html")),
    ("polls/detail.html", include_str!("../templates/polls/detail.html")),
    ("polls/edit.html", include_str!("../templates/polls/edit.html")),
    ("polls/add_choice.html", include_str!("../templates/polls/add_choice.html")),
    ("polls/edit_choice.html", include_str!("../templates/polls/edit_choice.html")),
    ("polls/results.html", include_str!("../templates/polls/results.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("register.html", include_str!("../templates/register.html")),
];

/// HTML templates compiled into the binary. Cheap to clone.
#[derive(Clone)]
pub struct Templates {
    tera: Arc<Tera>,
}

impl Templates {
    pub fn new() -> Result<Self, PollsError> {
        let mut tera = Tera::default();
        // Added together so `{% extends %}` chains resolve.
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    pub fn render(&self, name: &str, ctx: &Context) -> Result<Html<String>, PollsError> {
        Ok(Html(self.tera.render(name, ctx)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_templates_compile() {
        let templates = Templates::new().unwrap();
        let names: Vec<&str> = templates.tera.get_template_names().collect();
        assert_eq!(names.len(), TEMPLATES.len());
    }

    #[test]
    fn output_is_escaped() {
        let templates = Templates::new().unwrap();
        let mut ctx = Context::new();
        ctx.insert("messages", &Vec::<crate::messages::Message>::new());
        ctx.insert("user", &None::<crate::db::User>);
        ctx.insert("form_error", "");
        ctx.insert("username", "<b>bob</b>");
        ctx.insert("next", "\"><script>");
        let Html(body) = templates.render("login.html", &ctx).unwrap();
        assert!(!body.contains("<script>"));
        assert!(body.contains("&lt;b&gt;bob&lt;&#x2F;b&gt;"));
    }
}
