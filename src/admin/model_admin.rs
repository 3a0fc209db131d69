//! Declarative admin configuration for a model.
//!
//! A [`ModelAdmin`] only describes what the generic admin views show: list columns,
//! filters, search fields, form layout and inlines. It carries no behavior.

use serde::Serialize;

/// Pseudo-column holding the display string of a row.
pub const DISPLAY: &str = "__str__";

pub const DEFAULT_PER_PAGE: usize = 100;

/// A titled group of form fields.
#[derive(Debug, Clone, Serialize)]
pub struct Fieldset {
    pub name: &'static str,
    pub fields: Vec<&'static str>,
    /// Rendered collapsed by default.
    pub collapse: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineKind {
    Tabular,
    Stacked,
}

/// Child rows edited inside the parent's change form.
#[derive(Debug, Clone, Serialize)]
pub struct InlineAdmin {
    pub model: &'static str,
    /// Foreign key on the child pointing at the parent.
    pub fk_name: &'static str,
    pub kind: InlineKind,
    pub fields: Vec<&'static str>,
    /// Number of blank rows offered for new children.
    pub extra: usize,
}

impl InlineAdmin {
    pub fn tabular(model: &'static str, fk_name: &'static str) -> Self {
        Self {
            model,
            fk_name,
            kind: InlineKind::Tabular,
            fields: Vec::new(),
            extra: 3,
        }
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = &'static str>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }

    pub fn extra(mut self, extra: usize) -> Self {
        self.extra = extra;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelAdmin {
    pub model: &'static str,
    pub verbose_name: &'static str,
    pub list_display: Vec<&'static str>,
    pub list_filter: Vec<&'static str>,
    pub search_fields: Vec<&'static str>,
    pub readonly_fields: Vec<&'static str>,
    /// Fields holding decimal strings, ordered by value.
    pub decimal_fields: Vec<&'static str>,
    /// Field names, `-` prefix for descending.
    pub ordering: Vec<&'static str>,
    pub fieldsets: Vec<Fieldset>,
    pub inlines: Vec<InlineAdmin>,
    pub list_per_page: usize,
}

impl ModelAdmin {
    pub fn new(model: &'static str, verbose_name: &'static str) -> Self {
        Self {
            model,
            verbose_name,
            list_display: vec![DISPLAY],
            list_filter: Vec::new(),
            search_fields: Vec::new(),
            readonly_fields: Vec::new(),
            decimal_fields: Vec::new(),
            ordering: Vec::new(),
            fieldsets: Vec::new(),
            inlines: Vec::new(),
            list_per_page: DEFAULT_PER_PAGE,
        }
    }

    pub fn list_display(mut self, fields: impl IntoIterator<Item = &'static str>) -> Self {
        self.list_display = fields.into_iter().collect();
        self
    }

    pub fn list_filter(mut self, fields: impl IntoIterator<Item = &'static str>) -> Self {
        self.list_filter = fields.into_iter().collect();
        self
    }

    pub fn search_fields(mut self, fields: impl IntoIterator<Item = &'static str>) -> Self {
        self.search_fields = fields.into_iter().collect();
        self
    }

    pub fn readonly_fields(mut self, fields: impl IntoIterator<Item = &'static str>) -> Self {
        self.readonly_fields = fields.into_iter().collect();
        self
    }

    pub fn decimal_fields(mut self, fields: impl IntoIterator<Item = &'static str>) -> Self {
        self.decimal_fields = fields.into_iter().collect();
        self
    }

    pub fn ordering(mut self, fields: impl IntoIterator<Item = &'static str>) -> Self {
        self.ordering = fields.into_iter().collect();
        self
    }

    pub fn fieldset(
        mut self,
        name: &'static str,
        fields: impl IntoIterator<Item = &'static str>,
    ) -> Self {
        self.fieldsets.push(Fieldset {
            name,
            fields: fields.into_iter().collect(),
            collapse: false,
        });
        self
    }

    pub fn collapsed_fieldset(
        mut self,
        name: &'static str,
        fields: impl IntoIterator<Item = &'static str>,
    ) -> Self {
        self.fieldsets.push(Fieldset {
            name,
            fields: fields.into_iter().collect(),
            collapse: true,
        });
        self
    }

    pub fn inline(mut self, inline: InlineAdmin) -> Self {
        self.inlines.push(inline);
        self
    }

    pub fn is_readonly(&self, field: &str) -> bool {
        self.readonly_fields.contains(&field)
    }

    /// Whether the changelist may be ordered by `field`.
    pub fn is_sortable(&self, field: &str) -> bool {
        field == "id"
            || self.list_display.contains(&field)
            || self
                .ordering
                .iter()
                .any(|o| o.trim_start_matches('-') == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_configuration() {
        let admin = ModelAdmin::new("order", "Orders")
            .list_display(["id", "customer", "totalprice"])
            .list_filter(["isrecommended"])
            .readonly_fields(["ordertime"])
            .fieldset("Order Info", ["customer", "ordertime"])
            .collapsed_fieldset("AI Recommendation", ["isrecommended", "aiexplanation"])
            .inline(
                InlineAdmin::tabular("orderitem", "order")
                    .fields(["item", "quantity"])
                    .extra(1),
            );

        assert_eq!(admin.list_display, vec!["id", "customer", "totalprice"]);
        assert!(admin.is_readonly("ordertime"));
        assert!(!admin.is_readonly("customer"));
        assert!(!admin.fieldsets[0].collapse);
        assert!(admin.fieldsets[1].collapse);
        assert_eq!(admin.inlines[0].extra, 1);
        assert_eq!(admin.inlines[0].kind, InlineKind::Tabular);
        assert_eq!(admin.list_per_page, DEFAULT_PER_PAGE);
    }

    #[test]
    fn sortable_fields() {
        let admin = ModelAdmin::new("customerpreferencetag", "Preference tags")
            .list_display(["customer", "tag", "count"])
            .ordering(["-count"]);
        assert!(admin.is_sortable("count"));
        assert!(admin.is_sortable("id"));
        assert!(admin.is_sortable("tag"));
        assert!(!admin.is_sortable("password_hash"));
    }

    #[test]
    fn defaults_to_display_column() {
        let admin = ModelAdmin::new("tag", "Tags");
        assert_eq!(admin.list_display, vec![DISPLAY]);
        assert!(admin.fieldsets.is_empty());
    }
}
