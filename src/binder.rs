//! Document binding: fills the fixed document layouts with submitted data.
//!
//! Layouts are Handlebars templates rendered in strict mode. Every `{{name}}`
//! is HTML-escaped, images included (their `data:` URIs sit inside attribute
//! values). `{{#each rows}} ... {{/each}}` repeats a block once per row, in
//! order, and tags inside it resolve against the row only.
//!
//! A tag whose name is not bound fails the whole bind; nothing is defaulted.

use crate::error::{DocumentError, Result};
use crate::image::NormalizedImage;
use crate::model::{DeclarationRequest, ResolutionRequest};
use handlebars::{Handlebars, RenderError, RenderErrorReason};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

const DECLARATION_TEMPLATE: &str = include_str!("templates/declaration.html");
const PREVIEW_TEMPLATE: &str = include_str!("templates/preview.html");
const RESOLUTION_TEMPLATE: &str = include_str!("templates/resolution.html");

/// Identifier of a built-in document layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    Declaration,
    Preview,
    Resolution,
}

impl TemplateId {
    pub const ALL: [TemplateId; 3] = [
        TemplateId::Declaration,
        TemplateId::Preview,
        TemplateId::Resolution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateId::Declaration => "declaration",
            TemplateId::Preview => "preview",
            TemplateId::Resolution => "resolution",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            TemplateId::Declaration => DECLARATION_TEMPLATE,
            TemplateId::Preview => PREVIEW_TEMPLATE,
            TemplateId::Resolution => RESOLUTION_TEMPLATE,
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateId {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self> {
        TemplateId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| DocumentError::MissingTemplate(s.to_string()))
    }
}

/// Named values for one bind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BindingContext {
    values: Map<String, Value>,
}

impl BindingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values
            .insert(name.to_string(), Value::String(value.into()));
        self
    }

    /// Binds an image as its `data:` URI, or as an empty reference when absent.
    pub fn image(self, name: &str, image: Option<&NormalizedImage>) -> Self {
        let uri = image.map(NormalizedImage::to_data_uri).unwrap_or_default();
        self.text(name, uri)
    }

    pub fn rows(mut self, name: &str, rows: Vec<BindingContext>) -> Self {
        let rows = rows.into_iter().map(|row| Value::Object(row.values)).collect();
        self.values.insert(name.to_string(), Value::Array(rows));
        self
    }
}

/// HTML produced by a bind, consumed once by the render engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub template: TemplateId,
    pub html: String,
}

/// Holds the compiled layouts, built once at startup and shared by handlers.
pub struct DocumentBinder {
    registry: Handlebars<'static>,
}

impl DocumentBinder {
    /// Binder with every built-in layout registered.
    pub fn new() -> Result<Self> {
        let mut binder = Self::empty();
        for id in TemplateId::ALL {
            binder.register(id, id.source())?;
        }
        Ok(binder)
    }

    /// Binder with no layouts. Unbound names are errors, not blanks.
    pub fn empty() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        Self { registry }
    }

    pub fn register(&mut self, id: TemplateId, source: &str) -> Result<()> {
        self.registry
            .register_template_string(id.as_str(), source)
            .map_err(|e| DocumentError::TemplateSyntax {
                template: id.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn bind(&self, id: TemplateId, ctx: &BindingContext) -> Result<RenderedDocument> {
        if !self.registry.has_template(id.as_str()) {
            return Err(DocumentError::MissingTemplate(id.to_string()));
        }

        let html = self
            .registry
            .render(id.as_str(), ctx)
            .map_err(|e| binding_error(id, e))?;

        Ok(RenderedDocument { template: id, html })
    }

    /// Binds by identifier string, e.g. `"preview"`.
    pub fn bind_named(&self, name: &str, ctx: &BindingContext) -> Result<RenderedDocument> {
        self.bind(name.parse()?, ctx)
    }
}

fn binding_error(id: TemplateId, err: RenderError) -> DocumentError {
    match err.reason() {
        RenderErrorReason::MissingVariable(path) => DocumentError::Binding {
            template: id.to_string(),
            field: path.clone().unwrap_or_default(),
        },
        RenderErrorReason::TemplateNotFound(name) => DocumentError::MissingTemplate(name.clone()),
        _ => DocumentError::TemplateSyntax {
            template: id.to_string(),
            reason: err.to_string(),
        },
    }
}

/// Binding context for the declaration and preview layouts.
pub fn declaration_context(
    req: &DeclarationRequest,
    signature: Option<&NormalizedImage>,
    portrait: Option<&NormalizedImage>,
) -> BindingContext {
    BindingContext::new()
        .text("director_name", req.director_name.trim())
        .text("company_name", req.company_name.trim())
        .text("mobile_number", req.mobile_number.trim())
        .text("declaration_date", req.declaration_date.trim())
        .image("signature_src", signature)
        .image("portrait_src", portrait)
}

/// Binding context for the resolution layout.
///
/// Directors keep their input order; repeated names or PANs are rendered as given.
pub fn resolution_context(res: &ResolutionRequest) -> BindingContext {
    let document_name = format!("resolution-{}", res.resolution_id);
    let rows = res
        .directors
        .iter()
        .enumerate()
        .map(|(i, director)| {
            BindingContext::new()
                .text("serial", (i + 1).to_string())
                .text("id", director.id.as_str())
                .text("name", director.name.as_str())
                .text("pan_number", director.pan_number.as_str())
                .text("email", director.email.as_str())
                .text("document_name", document_name.as_str())
        })
        .collect();

    BindingContext::new()
        .text("resolution_id", res.resolution_id.as_str())
        .text("company_name", res.company_name.as_str())
        .text("meeting_date", res.date.as_str())
        .text("meeting_time", res.time.as_str())
        .text("meeting_address", res.address.as_str())
        .text("director_count", res.directors.len().to_string())
        .rows("directors", rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DirectorRecord;
    use pretty_assertions::assert_eq;

    fn request() -> DeclarationRequest {
        DeclarationRequest {
            director_name: "Alice".to_string(),
            company_name: "Acme & Sons".to_string(),
            mobile_number: "1234567890".to_string(),
            declaration_date: "01/01/2025".to_string(),
            signature_image: String::new(),
            portrait_image: String::new(),
        }
    }

    fn director(id: &str, name: &str, pan: &str) -> DirectorRecord {
        DirectorRecord {
            id: id.to_string(),
            name: name.to_string(),
            pan_number: pan.to_string(),
            email: format!("{}@example.com", id),
        }
    }

    fn binder_with(source: &str) -> DocumentBinder {
        let mut binder = DocumentBinder::empty();
        binder.register(TemplateId::Preview, source).unwrap();
        binder
    }

    fn bind_html(binder: &DocumentBinder, ctx: &BindingContext) -> String {
        binder.bind(TemplateId::Preview, ctx).unwrap().html
    }

    #[test]
    fn test_builtin_templates_register() {
        let binder = DocumentBinder::new().unwrap();
        for id in TemplateId::ALL {
            assert!(binder.registry.has_template(id.as_str()), "{id} missing");
        }
    }

    #[test]
    fn test_text_is_escaped() {
        let binder = binder_with("<p>{{ name }}</p>");
        let ctx = BindingContext::new().text("name", r#"<script>alert("x")</script> & 'co'"#);

        assert_eq!(
            bind_html(&binder, &ctx),
            "<p>&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#x27;co&#x27;</p>"
        );
    }

    #[test]
    fn test_image_is_embedded_as_data_uri() {
        let binder = binder_with(r#"<img src="{{img}}">"#);
        let image = NormalizedImage {
            mime: "image/png",
            bytes: vec![0, 0, 0],
        };
        let ctx = BindingContext::new().image("img", Some(&image));

        assert_eq!(
            bind_html(&binder, &ctx),
            r#"<img src="data:image/png;base64,AAAA">"#
        );
    }

    #[test]
    fn test_image_reference_cannot_break_out_of_attribute() {
        let binder = binder_with(r#"<img src="{{img}}"><input value="{{img}}">"#);
        let image = NormalizedImage {
            mime: "image/png\" onerror=\"fetch('http://169.254.169.254/')",
            bytes: vec![0, 0, 0],
        };
        let html = bind_html(&binder, &BindingContext::new().image("img", Some(&image)));

        assert!(!html.contains("onerror=\""), "attribute injected: {html}");
        assert_eq!(html.matches('"').count(), 4);
    }

    #[test]
    fn test_rows_repeat_in_order_without_dedup() {
        let binder = binder_with("{{#each rows}}[{{v}}]{{/each}}");
        let rows = ["b", "a", "b"]
            .iter()
            .map(|v| BindingContext::new().text("v", *v))
            .collect();
        let ctx = BindingContext::new().rows("rows", rows);

        assert_eq!(bind_html(&binder, &ctx), "[b][a][b]");
    }

    #[test]
    fn test_unbound_field_is_binding_error() {
        let mut binder = DocumentBinder::empty();
        binder.register(TemplateId::Declaration, "{{missing}}").unwrap();
        let err = binder
            .bind(TemplateId::Declaration, &BindingContext::new())
            .unwrap_err();
        match err {
            DocumentError::Binding { template, field } => {
                assert_eq!(template, "declaration");
                assert!(field.contains("missing"), "field was {field:?}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_row_fields_do_not_see_outer_scope() {
        let binder = binder_with("{{#each rows}}{{outer}}{{/each}}");
        let ctx = BindingContext::new()
            .text("outer", "x")
            .rows("rows", vec![BindingContext::new()]);
        assert!(matches!(
            binder.bind(TemplateId::Preview, &ctx),
            Err(DocumentError::Binding { .. })
        ));
    }

    #[test]
    fn test_malformed_templates() {
        for source in ["{{name", "{{#each rows}}x", "{{#each rows}}x{{/if}}"] {
            let result = DocumentBinder::empty().register(TemplateId::Preview, source);
            assert!(
                matches!(result, Err(DocumentError::TemplateSyntax { .. })),
                "expected syntax error for {source:?}"
            );
        }
    }

    #[test]
    fn test_unknown_template_name() {
        let binder = DocumentBinder::new().unwrap();
        let err = binder.bind_named("invoice", &BindingContext::new()).unwrap_err();
        assert!(matches!(err, DocumentError::MissingTemplate(name) if name == "invoice"));
    }

    #[test]
    fn test_unregistered_template() {
        let binder = DocumentBinder::empty();
        let err = binder
            .bind(TemplateId::Declaration, &BindingContext::new())
            .unwrap_err();
        assert!(matches!(err, DocumentError::MissingTemplate(_)));
    }

    #[test]
    fn test_declaration_binding_is_deterministic() {
        let binder = DocumentBinder::new().unwrap();
        let signature = NormalizedImage {
            mime: "image/png",
            bytes: vec![1, 2, 3],
        };
        let ctx = declaration_context(&request(), Some(&signature), None);

        let first = binder.bind(TemplateId::Declaration, &ctx).unwrap();
        let second = binder.bind(TemplateId::Declaration, &ctx).unwrap();
        assert_eq!(first, second);
        assert!(first.html.contains("Alice"));
        assert!(first.html.contains("Acme &amp; Sons"));
        assert!(first.html.contains(&signature.to_data_uri()));
    }

    #[test]
    fn test_preview_carries_fields() {
        let binder = DocumentBinder::new().unwrap();
        let ctx = declaration_context(&request(), None, None);
        let doc = binder.bind(TemplateId::Preview, &ctx).unwrap();
        assert_eq!(doc.template, TemplateId::Preview);
        assert!(doc.html.contains("1234567890"));
        assert!(doc.html.contains("01/01/2025"));
    }

    #[test]
    fn test_resolution_lists_directors_in_order() {
        let binder = DocumentBinder::new().unwrap();
        let res = ResolutionRequest {
            resolution_id: "RES-42".to_string(),
            company_name: "Acme".to_string(),
            date: "01/01/2025".to_string(),
            time: "10:00".to_string(),
            address: "1 Main St".to_string(),
            directors: vec![
                director("d2", "Zed", "ABCDE1234F"),
                director("d1", "Amy", "ABCDE1234F"),
                director("d2", "Zed", "ABCDE1234F"),
            ],
        };

        let doc = binder.bind(TemplateId::Resolution, &resolution_context(&res)).unwrap();
        let html = &doc.html;
        assert!(html.contains("RES-42"));
        assert_eq!(html.matches("ABCDE1234F").count(), 3);

        let zed = html.find("Zed").unwrap();
        let amy = html.find("Amy").unwrap();
        let zed_again = html.rfind("Zed").unwrap();
        assert!(zed < amy && amy < zed_again);
    }
}
