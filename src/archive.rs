//! Blog archive filters: by author, by tag, and by calendar date.

use serde::Serialize;
use time::macros::format_description;
use time::{Date, Month};

use crate::model::ApiError;
use crate::page::Page;

const MONTHS: [(&str, &str, Month); 12] = [
    ("January", "Jan", Month::January),
    ("February", "Feb", Month::February),
    ("March", "Mar", Month::March),
    ("April", "Apr", Month::April),
    ("May", "May", Month::May),
    ("June", "Jun", Month::June),
    ("July", "Jul", Month::July),
    ("August", "Aug", Month::August),
    ("September", "Sep", Month::September),
    ("October", "Oct", Month::October),
    ("November", "Nov", Month::November),
    ("December", "Dec", Month::December),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveFilter {
    Author(String),
    Tag(String),
    Date {
        year: i32,
        month: Option<Month>,
        day: Option<u8>,
    },
}

/// Archive filter as seen by templates.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FilterContext {
    pub filter_type: &'static str,
    pub filter: String,
    /// `filter` made readable: unslugified names, spelled out dates.
    pub filter_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_date: Option<Date>,
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Turn a slug back into words: `john-smith` becomes `John Smith`.
pub fn unslugify(slug: &str) -> String {
    slug.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Month from an English name or abbreviation, in any case.
pub fn month_number(name: &str) -> Option<Month> {
    let name = title_case(name);
    MONTHS
        .iter()
        .find(|(long, short, _)| *long == name || *short == name)
        .map(|(_, _, month)| *month)
}

fn bad_date(what: &str) -> ApiError {
    ApiError::not_found(format!("invalid archive date {}", what))
}

impl ArchiveFilter {
    /// Build a filter from an archive kind and its path arguments.
    pub fn parse(kind: &str, args: &[&str]) -> Result<ArchiveFilter, ApiError> {
        match (kind, args) {
            ("author", [author]) => Ok(ArchiveFilter::Author(author.to_string())),
            ("tag", [tag]) => Ok(ArchiveFilter::Tag(tag.to_string())),
            ("date", [year]) => ArchiveFilter::date(year, None, None),
            ("date", [year, month]) => ArchiveFilter::date(year, Some(*month), None),
            ("date", [year, month, day]) => ArchiveFilter::date(year, Some(*month), Some(*day)),
            ("author" | "tag" | "date", _) => Err(ApiError::not_found(format!(
                "wrong number of arguments for {} archive",
                kind
            ))),
            _ => Err(ApiError::not_found(format!("unknown archive {:?}", kind))),
        }
    }

    /// A partial date filter. The month may be a number or a month name.
    pub fn date(year: &str, month: Option<&str>, day: Option<&str>) -> Result<Self, ApiError> {
        let year: i32 = year.parse().map_err(|_| bad_date(year))?;
        Date::from_calendar_date(year, Month::January, 1).map_err(|_| bad_date("year"))?;

        let month = month
            .map(|month| {
                month_number(month)
                    .or_else(|| month.parse::<u8>().ok().and_then(|n| Month::try_from(n).ok()))
                    .ok_or_else(|| bad_date(month))
            })
            .transpose()?;

        let day = match (month, day) {
            (Some(month), Some(day)) => {
                let day: u8 = day.parse().map_err(|_| bad_date(day))?;
                Date::from_calendar_date(year, month, day).map_err(|_| bad_date("day"))?;
                Some(day)
            }
            (None, Some(_)) => return Err(bad_date("day without month")),
            (_, None) => None,
        };

        Ok(ArchiveFilter::Date { year, month, day })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ArchiveFilter::Author(_) => "author",
            ArchiveFilter::Tag(_) => "tag",
            ArchiveFilter::Date { .. } => "date",
        }
    }

    pub fn matches(&self, post: &Page) -> bool {
        match self {
            ArchiveFilter::Author(author) => {
                let humanized = unslugify(author);
                post.owner
                    .as_deref()
                    .is_some_and(|owner| owner == author || owner == humanized)
            }

            ArchiveFilter::Tag(tag) => {
                let humanized = unslugify(tag);
                post.tags()
                    .is_some_and(|tags| tags.contains(tag) || tags.contains(&humanized))
            }

            ArchiveFilter::Date { year, month, day } => post.date().is_some_and(|date| {
                date.year() == *year
                    && month.map_or(true, |month| date.month() == month)
                    && day.map_or(true, |day| date.day() == day)
            }),
        }
    }

    /// First day covered by a date filter.
    pub fn first_day(&self) -> Option<Date> {
        match *self {
            ArchiveFilter::Date { year, month, day } => Date::from_calendar_date(
                year,
                month.unwrap_or(Month::January),
                day.unwrap_or(1),
            )
            .ok(),
            _ => None,
        }
    }

    /// Human readable description of the filter.
    pub fn label(&self) -> String {
        match self {
            ArchiveFilter::Author(author) => author.clone(),
            ArchiveFilter::Tag(tag) => tag.clone(),
            ArchiveFilter::Date { month, day, .. } => {
                let Some(first) = self.first_day() else {
                    return String::new();
                };
                let formatted = match (month, day) {
                    (None, _) => first.format(format_description!("[year]")),
                    (Some(_), None) => {
                        first.format(format_description!("[month repr:long] [year]"))
                    }
                    (Some(_), Some(_)) => first.format(format_description!(
                        "[month repr:long] [day], [year]"
                    )),
                };
                formatted.unwrap_or_default()
            }
        }
    }

    pub fn context(&self) -> FilterContext {
        let filter_format = match self {
            ArchiveFilter::Date { month: None, .. } => Some("Y"),
            ArchiveFilter::Date { day: None, .. } => Some("N Y"),
            ArchiveFilter::Date { .. } => Some("N d, Y"),
            _ => None,
        };

        let filter = self.label();
        let filter_label = match self {
            ArchiveFilter::Date { .. } => filter.clone(),
            _ => unslugify(&filter),
        };

        FilterContext {
            filter_type: self.kind(),
            filter,
            filter_label,
            filter_format,
            filter_date: self.first_day(),
        }
    }
}

/// Keep the posts that match `filter`, preserving their order.
pub fn filter_posts<'a>(posts: Vec<&'a Page>, filter: &ArchiveFilter) -> Vec<&'a Page> {
    posts.into_iter().filter(|post| filter.matches(post)).collect()
}
