//! 服务端页面模板：从嵌入资源加载并渲染。

use axum::response::{Html, IntoResponse, Redirect, Response};
use minijinja::{Environment, context};
use rust_embed::RustEmbed;
use serde::Serialize;
use tracing::error;

use crate::error::ApiError;

#[derive(RustEmbed)]
#[folder = "templates"]
struct TemplateAssets;

/// Compiled page templates. `.html` templates are auto-escaped.
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn load() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for name in TemplateAssets::iter() {
            let Some(file) = TemplateAssets::get(&name) else {
                continue;
            };
            let source = String::from_utf8_lossy(&file.data).into_owned();
            env.add_template_owned(name.into_owned(), source)?;
        }
        Ok(Self { env })
    }

    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<Html<String>, ApiError> {
        let template = self.env.get_template(name).map_err(|err| {
            error!(template = name, error = %err, "template missing");
            ApiError::Internal("template error".into())
        })?;
        template.render(ctx).map(Html).map_err(|err| {
            error!(template = name, error = %err, "template render failed");
            ApiError::Internal("template error".into())
        })
    }

    /// 页面请求的错误页；未登录时跳转到登录页。
    pub fn error_page(&self, err: ApiError) -> Response {
        if matches!(err, ApiError::Unauthorized) {
            return Redirect::to("/auth").into_response();
        }
        let status = err.status();
        let rendered = self.render(
            "error.html",
            context! {
                title => "BDPADrive - Error",
                status => status.as_u16(),
                message => err.message(),
            },
        );
        match rendered {
            Ok(html) => (status, html).into_response(),
            Err(_) => (status, err.message()).into_response(),
        }
    }

    pub fn not_found(&self) -> Response {
        self.error_page(ApiError::NotFound("Page not found".into()))
    }
}
