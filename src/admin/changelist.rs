//! Changelist evaluation: filter, search, order and paginate admin rows.

use std::cmp::Ordering;
use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::model_admin::ModelAdmin;
use super::Row;
use crate::error::AppError;

const SEARCH: &str = "q";
const ORDER: &str = "o";
const PAGE: &str = "p";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeListParams {
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: usize,
    pub filters: Vec<(String, String)>,
}

impl ChangeListParams {
    pub fn parse(admin: &ModelAdmin, raw: HashMap<String, String>) -> Result<Self, AppError> {
        let mut params = ChangeListParams {
            search: None,
            ordering: None,
            page: 1,
            filters: Vec::new(),
        };
        for (key, value) in raw {
            match key.as_str() {
                SEARCH => params.search = Some(value).filter(|q| !q.trim().is_empty()),
                ORDER => {
                    let field = value.trim_start_matches('-');
                    if !admin.is_sortable(field) {
                        return Err(AppError::BadRequest(format!(
                            "cannot order {} by {field}",
                            admin.model
                        )));
                    }
                    params.ordering = Some(value);
                }
                PAGE => {
                    params.page = value
                        .parse::<usize>()
                        .ok()
                        .filter(|p| *p >= 1)
                        .ok_or_else(|| AppError::BadRequest(format!("invalid page {value:?}")))?;
                }
                field if admin.list_filter.contains(&field) => {
                    params.filters.push((key, value));
                }
                _ => {
                    return Err(AppError::BadRequest(format!(
                        "unknown changelist parameter {key:?}"
                    )))
                }
            }
        }
        params.filters.sort();
        Ok(params)
    }
}

#[derive(Debug, Serialize)]
pub struct ChangeList {
    pub model: &'static str,
    pub count: usize,
    pub page: usize,
    pub num_pages: usize,
    pub columns: Vec<&'static str>,
    pub filters: Vec<&'static str>,
    pub search_fields: Vec<&'static str>,
    pub results: Vec<Row>,
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn filter_matches(value: Option<&Value>, wanted: &str) -> bool {
    match value {
        None | Some(Value::Null) => wanted.is_empty() || wanted == "null",
        Some(Value::String(s)) => {
            // timestamps also match on their date part
            s == wanted
                || (s.len() > wanted.len()
                    && s.starts_with(wanted)
                    && s[wanted.len()..].starts_with('T'))
        }
        Some(other) => other.to_string() == wanted,
    }
}

fn search_matches(row: &Row, fields: &[&str], term: &str) -> bool {
    fields.iter().any(|field| {
        row.get(*field)
            .map(|v| render(v).to_lowercase().contains(term))
            .unwrap_or(false)
    })
}

fn compare(a: Option<&Value>, b: Option<&Value>, decimal: bool) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            if decimal {
                if let (Ok(x), Ok(y)) = (x.parse::<Decimal>(), y.parse::<Decimal>()) {
                    return x.cmp(&y);
                }
            }
            // rfc3339 drops zero fractional seconds, so compare instants
            match (
                OffsetDateTime::parse(x, &Rfc3339),
                OffsetDateTime::parse(y, &Rfc3339),
            ) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => render(x).cmp(&render(y)),
    }
}

/// Applies the changelist parameters to `rows` and projects the page onto
/// `list_display` (plus `id`).
pub fn build(
    admin: &ModelAdmin,
    rows: Vec<Row>,
    params: &ChangeListParams,
) -> Result<ChangeList, AppError> {
    let mut rows: Vec<Row> = rows
        .into_iter()
        .filter(|row| {
            params
                .filters
                .iter()
                .all(|(field, wanted)| {
                    // foreign keys filter by display string or by id
                    filter_matches(row.get(field), wanted)
                        || filter_matches(row.get(&format!("{field}_id")), wanted)
                })
        })
        .collect();

    if let Some(q) = &params.search {
        let terms: Vec<String> = q.split_whitespace().map(str::to_lowercase).collect();
        rows.retain(|row| {
            terms
                .iter()
                .all(|term| search_matches(row, &admin.search_fields, term))
        });
    }

    let ordering: Vec<&str> = match &params.ordering {
        Some(o) => vec![o.as_str()],
        None => admin.ordering.clone(),
    };
    if !ordering.is_empty() {
        rows.sort_by(|a, b| {
            ordering
                .iter()
                .map(|key| {
                    let (field, desc) = match key.strip_prefix('-') {
                        Some(field) => (field, true),
                        None => (*key, false),
                    };
                    let decimal = admin.decimal_fields.contains(&field);
                    let ord = compare(a.get(field), b.get(field), decimal);
                    if desc {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    let count = rows.len();
    let per_page = admin.list_per_page.max(1);
    let num_pages = count.div_ceil(per_page).max(1);
    if params.page > num_pages {
        return Err(AppError::BadRequest(format!("invalid page {}", params.page)));
    }

    let results = rows
        .into_iter()
        .skip((params.page - 1) * per_page)
        .take(per_page)
        .map(|row| {
            let mut projected = Row::new();
            if let Some(id) = row.get("id") {
                projected.insert("id".into(), id.clone());
            }
            for column in &admin.list_display {
                let value = row.get(*column).cloned().unwrap_or(Value::Null);
                projected.insert((*column).to_string(), value);
            }
            projected
        })
        .collect();

    Ok(ChangeList {
        model: admin.model,
        count,
        page: params.page,
        num_pages,
        columns: admin.list_display.clone(),
        filters: admin.list_filter.clone(),
        search_fields: admin.search_fields.clone(),
        results,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn admin() -> ModelAdmin {
        ModelAdmin::new("order", "Orders")
            .list_display(["customer", "restaurant", "totalprice", "isrecommended"])
            .list_filter(["isrecommended", "ordertime", "restaurant"])
            .search_fields(["customer__firstname", "restaurant__name"])
            .decimal_fields(["totalprice"])
            .ordering(["-ordertime"])
    }

    fn row(id: i64, firstname: &str, restaurant: &str, total: &str, ai: bool, time: &str) -> Row {
        let Value::Object(map) = json!({
            "id": id,
            "customer": format!("{firstname} Doe"),
            "customer__firstname": firstname,
            "restaurant": restaurant,
            "restaurant__name": restaurant,
            "totalprice": total,
            "isrecommended": ai,
            "ordertime": time,
            "aiexplanation": "secret",
        }) else {
            unreachable!()
        };
        map
    }

    fn rows() -> Vec<Row> {
        vec![
            row(1, "John", "Thai Spice", "9.50", true, "2025-03-01T12:00:00Z"),
            row(2, "Jane", "Dragon Palace", "27.98", false, "2025-03-02T12:00:00Z"),
            row(3, "Johnny", "Thai Spice", "100.00", false, "2025-03-03T09:30:00Z"),
        ]
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn ids(list: &ChangeList) -> Vec<i64> {
        list.results
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn default_ordering_is_applied() {
        let admin = admin();
        let p = ChangeListParams::parse(&admin, HashMap::new()).unwrap();
        let list = build(&admin, rows(), &p).unwrap();
        assert_eq!(ids(&list), vec![3, 2, 1]);
        assert_eq!(list.count, 3);
        assert_eq!(list.num_pages, 1);
    }

    #[test]
    fn results_are_projected_onto_list_display() {
        let admin = admin();
        let p = ChangeListParams::parse(&admin, HashMap::new()).unwrap();
        let list = build(&admin, rows(), &p).unwrap();
        let first = &list.results[0];
        assert_eq!(first.len(), 5);
        assert!(first.get("aiexplanation").is_none());
        assert_eq!(first["restaurant"], "Thai Spice");
    }

    #[test]
    fn search_requires_every_term() {
        let admin = admin();
        let p = ChangeListParams::parse(&admin, params(&[("q", "JOHN thai")])).unwrap();
        let list = build(&admin, rows(), &p).unwrap();
        assert_eq!(ids(&list), vec![3, 1]);

        let p = ChangeListParams::parse(&admin, params(&[("q", "john dragon")])).unwrap();
        assert_eq!(build(&admin, rows(), &p).unwrap().count, 0);
    }

    #[test]
    fn filters_match_booleans_and_dates() {
        let admin = admin();
        let p = ChangeListParams::parse(&admin, params(&[("isrecommended", "false")])).unwrap();
        assert_eq!(ids(&build(&admin, rows(), &p).unwrap()), vec![3, 2]);

        let p = ChangeListParams::parse(&admin, params(&[("ordertime", "2025-03-02")])).unwrap();
        assert_eq!(ids(&build(&admin, rows(), &p).unwrap()), vec![2]);

        let p = ChangeListParams::parse(
            &admin,
            params(&[("restaurant", "Thai Spice"), ("isrecommended", "true")]),
        )
        .unwrap();
        assert_eq!(ids(&build(&admin, rows(), &p).unwrap()), vec![1]);
    }

    #[test]
    fn foreign_keys_filter_by_id() {
        let admin = admin();
        let mut rows = rows();
        for (row, restaurant_id) in rows.iter_mut().zip([7, 8, 7]) {
            row.insert("restaurant_id".into(), json!(restaurant_id));
        }
        let p = ChangeListParams::parse(&admin, params(&[("restaurant", "7")])).unwrap();
        assert_eq!(ids(&build(&admin, rows, &p).unwrap()), vec![3, 1]);
    }

    #[test]
    fn decimal_strings_order_numerically() {
        let admin = admin();
        let p = ChangeListParams::parse(&admin, params(&[("o", "totalprice")])).unwrap();
        assert_eq!(ids(&build(&admin, rows(), &p).unwrap()), vec![1, 2, 3]);

        let p = ChangeListParams::parse(&admin, params(&[("o", "-totalprice")])).unwrap();
        assert_eq!(ids(&build(&admin, rows(), &p).unwrap()), vec![3, 2, 1]);
    }

    #[test]
    fn timestamps_order_by_instant() {
        let admin = admin();
        let mut rows = rows();
        rows[0].insert("ordertime".into(), json!("2025-03-01T12:00:00.5Z"));
        rows[1].insert("ordertime".into(), json!("2025-03-01T12:00:00Z"));
        rows[2].insert("ordertime".into(), json!("2025-03-01T11:59:59.999Z"));
        let p = ChangeListParams::parse(&admin, params(&[])).unwrap();
        assert_eq!(ids(&build(&admin, rows, &p).unwrap()), vec![1, 2, 3]);
    }

    #[test]
    fn plain_strings_are_not_ordered_as_numbers() {
        let admin = ModelAdmin::new("user", "Users")
            .list_display(["username"])
            .ordering(["username"]);
        let rows: Vec<Row> = ["9", "10", "inf", "alice"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut row = Row::new();
                row.insert("id".into(), json!(i as i64 + 1));
                row.insert("username".into(), json!(name));
                row
            })
            .collect();
        let p = ChangeListParams::parse(&admin, params(&[])).unwrap();
        assert_eq!(ids(&build(&admin, rows, &p).unwrap()), vec![2, 1, 4, 3]);
    }

    #[test]
    fn unknown_parameters_are_rejected() {
        let admin = admin();
        assert!(ChangeListParams::parse(&admin, params(&[("aiexplanation", "x")])).is_err());
        assert!(ChangeListParams::parse(&admin, params(&[("o", "aiexplanation")])).is_err());
        assert!(ChangeListParams::parse(&admin, params(&[("p", "0")])).is_err());
    }

    #[test]
    fn pagination_slices_results() {
        let mut admin = admin();
        admin.list_per_page = 2;
        let p = ChangeListParams::parse(&admin, params(&[("p", "2")])).unwrap();
        let list = build(&admin, rows(), &p).unwrap();
        assert_eq!(list.num_pages, 2);
        assert_eq!(ids(&list), vec![1]);

        let p = ChangeListParams::parse(&admin, params(&[("p", "3")])).unwrap();
        assert!(build(&admin, rows(), &p).is_err());
    }

    #[test]
    fn empty_changelist_has_one_page() {
        let admin = admin();
        let p = ChangeListParams::parse(&admin, HashMap::new()).unwrap();
        let list = build(&admin, Vec::new(), &p).unwrap();
        assert_eq!(list.count, 0);
        assert_eq!(list.num_pages, 1);
        assert!(list.results.is_empty());
    }
}
