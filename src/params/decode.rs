//! Validating decoder from raw query parameters to typed search requests.
//!
//! Decoding never stops at the first problem. Every parameter is checked and
//! all of the messages are returned together in one [`ValidationError`].

use crate::error::ValidationError;
use crate::params::list::parse_list;
use crate::params::registry::{FieldKind, FilterField, Registered, Resource};
use crate::query::color::Rgb;
use crate::query::filter::{FilterSpec, Mode, Values};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern compiles"));

/// Query parameters as received, in order.
///
/// When a parameter repeats, the last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParams {
    pairs: Vec<(String, String)>,
}

impl RawParams {
    pub fn parse(query: Option<&str>) -> Self {
        url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
            .into_owned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Bounds applied to pagination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Deepest result (`page * pageSize`) the engine will serve.
    pub max_result_window: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
            max_result_window: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationSpec {
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
}

impl PaginationSpec {
    /// Offset of the first hit on this page.
    pub fn from(self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec<S> {
    pub field: S,
    pub order: SortOrder,
}

/// A fully validated list request.
#[derive(Debug, Clone)]
pub struct SearchSpec<R: Resource> {
    pub query: Option<String>,
    pub filters: Vec<FilterSpec<R::Field>>,
    pub aggregations: Vec<R::Aggregation>,
    pub sort: Option<SortSpec<R::Sort>>,
    pub includes: BTreeSet<R::Include>,
    pub pagination: PaginationSpec,
}

/// A fully validated single-document request.
#[derive(Debug, Clone)]
pub struct ItemSpec<R: Resource> {
    pub includes: BTreeSet<R::Include>,
}

/// Collects messages as parameters are checked.
struct Decoder<'a> {
    params: &'a RawParams,
    errors: Vec<String>,
}

impl<'a> Decoder<'a> {
    const fn new(params: &'a RawParams) -> Self {
        Self {
            params,
            errors: Vec::new(),
        }
    }

    fn reject(&mut self, param: &str, message: impl fmt::Display) {
        self.errors.push(format!("{param}: {message}"));
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationError> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError::new(self.errors))
        }
    }

    /// A positive integer parameter, `None` when absent or invalid.
    fn integer(&mut self, param: &str) -> Option<Option<i64>> {
        let Some(raw) = self.params.get(param) else {
            return Some(None);
        };
        match raw.trim().parse::<i64>() {
            Ok(value) => Some(Some(value)),
            Err(_) => {
                self.reject(param, format!("'{raw}' is not a valid integer"));
                None
            }
        }
    }

    fn pagination(&mut self, limits: &Limits, resource: &str) -> PaginationSpec {
        let fallback = PaginationSpec {
            page: 1,
            page_size: limits.default_page_size,
        };

        let page = self.integer("page").and_then(|page| match page {
            None => Some(1),
            Some(page) => match u64::try_from(page) {
                Ok(page) if page >= 1 => Some(page),
                _ => {
                    self.reject("page", "must be greater than or equal to 1");
                    None
                }
            },
        });

        let page_size = self.integer("pageSize").and_then(|size| match size {
            None => Some(limits.default_page_size),
            Some(size) => match u32::try_from(size) {
                Ok(size) if (1..=limits.max_page_size).contains(&size) => Some(size),
                _ => {
                    self.reject(
                        "pageSize",
                        format!("must be between 1 and {}", limits.max_page_size),
                    );
                    None
                }
            },
        });

        let (Some(page), Some(page_size)) = (page, page_size) else {
            return fallback;
        };
        let within_window = page
            .checked_mul(u64::from(page_size))
            .is_some_and(|end| end <= limits.max_result_window);
        let Some(page) = u32::try_from(page).ok().filter(|_| within_window) else {
            self.reject(
                "page",
                format!(
                    "Only the first {} {resource} are available in the API. \
                     If you want more {resource}, you can download a snapshot of the complete catalogue.",
                    limits.max_result_window
                ),
            );
            return fallback;
        };

        PaginationSpec { page, page_size }
    }

    /// Whitelisted names from a list parameter, without duplicates.
    fn names<T: Registered>(&mut self, param: &str) -> Vec<T> {
        let Some(raw) = self.params.get(param) else {
            return Vec::new();
        };

        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for item in parse_list(raw) {
            match T::from_name(&item) {
                Some(value) if !valid.contains(&value) => valid.push(value),
                Some(_) => {}
                None => invalid.push(item),
            }
        }
        if !invalid.is_empty() {
            self.reject(param, invalid_values::<T>(&invalid));
        }

        valid
    }

    fn sort<S: Registered>(&mut self) -> Option<SortSpec<S>> {
        let field = self.names::<S>("sort").into_iter().next();
        let order = match self.params.get("sortOrder") {
            None => Some(SortOrder::Asc),
            Some("asc") => Some(SortOrder::Asc),
            Some("desc") => Some(SortOrder::Desc),
            Some(other) => {
                self.reject(
                    "sortOrder",
                    format!("'{other}' is not a valid value. Please choose one of: ['asc', 'desc']"),
                );
                None
            }
        };
        Some(SortSpec {
            field: field?,
            order: order?,
        })
    }

    fn filter<F: FilterField>(&mut self, field: F) -> Option<FilterSpec<F>> {
        match field.kind() {
            FieldKind::List => self.list_filter(field),
            FieldKind::Single => {
                let value = self.params.get(field.name())?.trim();
                Some(FilterSpec::Terms {
                    field,
                    mode: Mode::Include,
                    values: Values::new([value.to_string()])?,
                })
            }
            FieldKind::DateRange => {
                let from = self.date(&format!("{}.from", field.name()));
                let to = self.date(&format!("{}.to", field.name()));
                match (from, to) {
                    (None, None) => None,
                    (from, to) => Some(FilterSpec::Range { field, from, to }),
                }
            }
            FieldKind::Color => {
                let raw = self.params.get(field.name())?;
                match raw.parse::<Rgb>() {
                    Ok(color) => Some(FilterSpec::Color { field, color }),
                    Err(err) => {
                        self.reject(field.name(), err);
                        None
                    }
                }
            }
        }
    }

    fn list_filter<F: FilterField>(&mut self, field: F) -> Option<FilterSpec<F>> {
        let items = parse_list(self.params.get(field.name())?);
        let negated = items.iter().filter(|item| item.starts_with('!')).count();

        let mode = if negated == 0 {
            Mode::Include
        } else if negated == items.len() {
            Mode::Exclude
        } else {
            self.reject(
                field.name(),
                "cannot mix included and excluded ('!') values",
            );
            return None;
        };

        let values = items.into_iter().map(|item| match mode {
            Mode::Include => item,
            Mode::Exclude => item[1..].to_string(),
        });
        Some(FilterSpec::Terms {
            field,
            mode,
            values: Values::new(values)?,
        })
    }

    fn date(&mut self, param: &str) -> Option<NaiveDate> {
        let raw = self.params.get(param)?;
        let parsed = DATE
            .is_match(raw)
            .then(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
            .flatten();
        if parsed.is_none() {
            self.reject(
                param,
                format!("'{raw}' is not a valid date. Please use the format YYYY-MM-DD"),
            );
        }
        parsed
    }
}

fn quote_all<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.map(|v| format!("'{v}'")).collect::<Vec<_>>().join(", ")
}

fn invalid_values<T: Registered>(invalid: &[String]) -> String {
    let subject = match invalid {
        [one] => format!("'{one}' is not a valid value"),
        many => format!(
            "{} are not valid values",
            quote_all(many.iter().map(String::as_str))
        ),
    };
    let choices = quote_all(T::ALL.iter().map(|value| value.name()));

    format!("{subject}. Please choose one of: [{choices}]")
}

/// Decode the parameters of a list request.
pub fn decode_search<R: Resource>(
    params: &RawParams,
    limits: &Limits,
) -> Result<SearchSpec<R>, ValidationError> {
    let mut decoder = Decoder::new(params);

    let pagination = decoder.pagination(limits, R::PATH);
    let query = params
        .get("query")
        .filter(|query| !query.trim().is_empty())
        .map(ToString::to_string);
    let includes = decoder.names::<R::Include>("include").into_iter().collect();
    let aggregations = decoder.names::<R::Aggregation>("aggregations");
    let sort = decoder.sort::<R::Sort>();
    let filters = R::Field::ALL
        .iter()
        .filter_map(|field| decoder.filter(*field))
        .collect();

    decoder.finish(SearchSpec {
        query,
        filters,
        aggregations,
        sort,
        includes,
        pagination,
    })
}

/// Decode the parameters of a single-document request.
pub fn decode_item<R: Resource>(params: &RawParams) -> Result<ItemSpec<R>, ValidationError> {
    let mut decoder = Decoder::new(params);
    let includes = decoder.names::<R::Include>("include").into_iter().collect();
    decoder.finish(ItemSpec { includes })
}
