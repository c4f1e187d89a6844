//! Static per-resource registries of the names clients may use.
//!
//! Every filter parameter, aggregation, include and sort key a resource
//! accepts is an enum variant here. Decoding checks raw strings against these
//! sets once; everything downstream works with the typed values.

use crate::config::Config;
use crate::query::template;
use serde_json::Value;
use std::fmt;

/// A closed set of named values accepted by a query parameter.
pub trait Registered: Copy + Ord + fmt::Debug + Send + Sync + 'static {
    /// Every value, in the order they are listed in error messages.
    const ALL: &'static [Self];

    /// The public name, as it appears in query strings.
    fn name(self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|value| value.name() == name)
    }
}

macro_rules! registry {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident { $($variant:ident => $value:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl Registered for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $value),+
                }
            }
        }
    };
}

/// How a filter parameter's raw value is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Comma-separated list, optionally quoted, optionally `!`-negated.
    List,
    /// A single value taken verbatim.
    Single,
    /// Read from `{name}.from` and `{name}.to`, both `YYYY-MM-DD`.
    DateRange,
    /// Six hex digits with an optional leading `#`.
    Color,
}

/// A filterable field of a resource.
pub trait FilterField: Registered {
    type Aggregation: AggregationField;

    fn kind(self) -> FieldKind;

    /// Engine field the filter applies to. Empty for color filters, which
    /// score rather than match.
    fn path(self) -> &'static str;

    /// The aggregation over the same field, if any. A filter and its paired
    /// aggregation are compiled so the aggregation ignores the filter.
    fn paired(self) -> Option<Self::Aggregation>;
}

/// Shape of the buckets returned for an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketShape {
    /// Buckets are keyed by id; the label comes from a sub-aggregation.
    LabeledId,
    /// Buckets are keyed by label, which doubles as the id.
    LabelOnly,
}

/// Engine-side parameters of an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationParams {
    /// Name of the container aggregation in the engine request.
    pub container: &'static str,
    /// Nested `aggregatableValues` object the buckets are drawn from.
    pub path: &'static str,
    /// Bucket ceiling, sized to the field's known cardinality.
    pub size: u32,
    pub shape: BucketShape,
    /// `type` of each bucket's `data` in responses.
    pub bucket_type: &'static str,
}

pub trait AggregationField: Registered {
    fn params(self) -> AggregationParams;

    /// Key of this aggregation in the response's `aggregations` object.
    fn response_key(self) -> &'static str {
        self.name()
    }
}

pub trait SortField: Registered {
    fn path(self) -> &'static str;
}

/// One of the two searchable collections.
pub trait Resource: Send + Sync + 'static {
    /// Singular display name used in error descriptions.
    const LABEL: &'static str;
    /// Route segment, also used in messages (`Only the first 10000 works ...`).
    const PATH: &'static str;
    /// Stored fields fetched for each hit.
    const SOURCE: &'static [&'static str];
    /// Whether only documents of type `Visible` may be listed.
    const VISIBLE_ONLY: bool;

    type Field: FilterField<Aggregation = Self::Aggregation>;
    type Aggregation: AggregationField;
    type Include: Registered;
    type Sort: SortField;

    /// Relevance query template with a `{{query}}` placeholder.
    fn relevance_template() -> &'static Value;

    /// Index holding this resource's documents.
    fn index(config: &Config) -> &str;
}

#[derive(Debug, Clone, Copy)]
pub struct Works;

#[derive(Debug, Clone, Copy)]
pub struct Images;

impl Resource for Works {
    const LABEL: &'static str = "Work";
    const PATH: &'static str = "works";
    const SOURCE: &'static [&'static str] = &["display", "type"];
    const VISIBLE_ONLY: bool = true;

    type Field = WorkField;
    type Aggregation = WorkAggregation;
    type Include = WorkInclude;
    type Sort = WorkSort;

    fn relevance_template() -> &'static Value {
        &template::WORKS
    }

    fn index(config: &Config) -> &str {
        &config.works_index
    }
}

impl Resource for Images {
    const LABEL: &'static str = "Image";
    const PATH: &'static str = "images";
    const SOURCE: &'static [&'static str] = &["display"];
    const VISIBLE_ONLY: bool = false;

    type Field = ImageField;
    type Aggregation = ImageAggregation;
    type Include = ImageInclude;
    type Sort = ImageSort;

    fn relevance_template() -> &'static Value {
        &template::IMAGES
    }

    fn index(config: &Config) -> &str {
        &config.images_index
    }
}

registry! {
    pub enum WorkField {
        WorkType => "workType",
        Type => "type",
        ProductionDates => "production.dates",
        Languages => "languages",
        GenresLabel => "genres.label",
        Genres => "genres",
        SubjectsLabel => "subjects.label",
        Subjects => "subjects",
        ContributorsLabel => "contributors.agent.label",
        Contributors => "contributors.agent",
        Identifiers => "identifiers",
        Items => "items",
        ItemsIdentifiers => "items.identifiers",
        License => "items.locations.license",
        LocationType => "items.locations.locationType",
        AccessStatus => "items.locations.accessConditions.status",
        PartOf => "partOf",
        PartOfTitle => "partOf.title",
        Availabilities => "availabilities",
    }
}

impl FilterField for WorkField {
    type Aggregation = WorkAggregation;

    fn kind(self) -> FieldKind {
        match self {
            Self::ProductionDates => FieldKind::DateRange,
            Self::PartOf | Self::PartOfTitle => FieldKind::Single,
            _ => FieldKind::List,
        }
    }

    fn path(self) -> &'static str {
        match self {
            Self::WorkType => "filterableValues.format.id",
            Self::Type => "filterableValues.workType",
            Self::ProductionDates => "filterableValues.production.dates.range.from",
            Self::Languages => "filterableValues.languages.id",
            Self::GenresLabel => "filterableValues.genres.label",
            Self::Genres => "filterableValues.genres.concepts.id",
            Self::SubjectsLabel => "filterableValues.subjects.label",
            Self::Subjects => "filterableValues.subjects.concepts.id",
            Self::ContributorsLabel => "filterableValues.contributors.agent.label",
            Self::Contributors => "filterableValues.contributors.agent.id",
            // Case-insensitive match on the query copy of identifiers
            Self::Identifiers => "query.identifiers.value",
            Self::Items => "filterableValues.items.id",
            Self::ItemsIdentifiers => "filterableValues.items.identifiers.value",
            Self::License => "filterableValues.items.locations.license.id",
            Self::LocationType => "filterableValues.items.locations.locationType.id",
            Self::AccessStatus => "filterableValues.items.locations.accessConditions.status.id",
            Self::PartOf => "filterableValues.partOf.id",
            Self::PartOfTitle => "filterableValues.partOf.title",
            Self::Availabilities => "filterableValues.availabilities.id",
        }
    }

    fn paired(self) -> Option<WorkAggregation> {
        match self {
            Self::WorkType => Some(WorkAggregation::WorkType),
            Self::Languages => Some(WorkAggregation::Languages),
            Self::GenresLabel => Some(WorkAggregation::GenresLabel),
            Self::Genres => Some(WorkAggregation::Genres),
            Self::SubjectsLabel => Some(WorkAggregation::SubjectsLabel),
            Self::Subjects => Some(WorkAggregation::Subjects),
            Self::ContributorsLabel => Some(WorkAggregation::ContributorsLabel),
            Self::Contributors => Some(WorkAggregation::Contributors),
            Self::License => Some(WorkAggregation::License),
            Self::Availabilities => Some(WorkAggregation::Availabilities),
            _ => None,
        }
    }
}

registry! {
    pub enum WorkAggregation {
        WorkType => "workType",
        GenresLabel => "genres.label",
        Genres => "genres",
        ProductionDates => "production.dates",
        SubjectsLabel => "subjects.label",
        Subjects => "subjects",
        Languages => "languages",
        ContributorsLabel => "contributors.agent.label",
        Contributors => "contributors.agent",
        License => "items.locations.license",
        Availabilities => "availabilities",
    }
}

const fn params(
    container: &'static str,
    path: &'static str,
    size: u32,
    shape: BucketShape,
    bucket_type: &'static str,
) -> AggregationParams {
    AggregationParams {
        container,
        path,
        size,
        shape,
        bucket_type,
    }
}

impl AggregationField for WorkAggregation {
    fn params(self) -> AggregationParams {
        use BucketShape::{LabelOnly, LabeledId};
        match self {
            Self::WorkType => params("format", "aggregatableValues.workType", 30, LabeledId, "Format"),
            Self::ProductionDates => params(
                "productionDates",
                "aggregatableValues.production.dates",
                10,
                LabeledId,
                "Period",
            ),
            Self::GenresLabel => params("genresLabel", "aggregatableValues.genres", 20, LabelOnly, "Genre"),
            Self::Genres => params("genres", "aggregatableValues.genres", 20, LabeledId, "Genre"),
            Self::SubjectsLabel => params(
                "subjectsLabel",
                "aggregatableValues.subjects",
                20,
                LabelOnly,
                "Subject",
            ),
            Self::Subjects => params("subjects", "aggregatableValues.subjects", 20, LabeledId, "Subject"),
            Self::ContributorsLabel => params(
                "contributorsLabel",
                "aggregatableValues.contributors.agent",
                20,
                LabelOnly,
                "Agent",
            ),
            Self::Contributors => params(
                "contributors",
                "aggregatableValues.contributors.agent",
                20,
                LabeledId,
                "Agent",
            ),
            Self::Languages => params("languages", "aggregatableValues.languages", 200, LabeledId, "Language"),
            Self::License => params(
                "license",
                "aggregatableValues.items.locations.license",
                20,
                LabeledId,
                "License",
            ),
            Self::Availabilities => params(
                "availabilities",
                "aggregatableValues.availabilities",
                10,
                LabeledId,
                "Availability",
            ),
        }
    }
}

registry! {
    pub enum WorkInclude {
        Identifiers => "identifiers",
        Items => "items",
        Holdings => "holdings",
        Subjects => "subjects",
        Genres => "genres",
        Contributors => "contributors",
        Production => "production",
        Languages => "languages",
        Notes => "notes",
        FormerFrequency => "formerFrequency",
        Designation => "designation",
        Images => "images",
        Parts => "parts",
        PartOf => "partOf",
        PrecededBy => "precededBy",
        SucceededBy => "succeededBy",
    }
}

registry! {
    pub enum WorkSort {
        ProductionDates => "production.dates",
        CreatedDate => "items.locations.createdDate",
    }
}

impl SortField for WorkSort {
    fn path(self) -> &'static str {
        match self {
            Self::ProductionDates => "filterableValues.production.dates.range.from",
            Self::CreatedDate => "filterableValues.items.locations.createdDate",
        }
    }
}

registry! {
    pub enum ImageField {
        License => "locations.license",
        ContributorsLabel => "source.contributors.agent.label",
        Contributors => "source.contributors.agent",
        GenresLabel => "source.genres.label",
        Genres => "source.genres",
        SubjectsLabel => "source.subjects.label",
        Subjects => "source.subjects",
        ProductionDates => "source.production.dates",
        Color => "color",
    }
}

impl FilterField for ImageField {
    type Aggregation = ImageAggregation;

    fn kind(self) -> FieldKind {
        match self {
            Self::ProductionDates => FieldKind::DateRange,
            Self::Color => FieldKind::Color,
            _ => FieldKind::List,
        }
    }

    fn path(self) -> &'static str {
        match self {
            Self::License => "filterableValues.locations.license.id",
            Self::ContributorsLabel => "filterableValues.source.contributors.agent.label",
            Self::Contributors => "filterableValues.source.contributors.agent.id",
            Self::GenresLabel => "filterableValues.source.genres.label",
            Self::Genres => "filterableValues.source.genres.concepts.id",
            Self::SubjectsLabel => "filterableValues.source.subjects.label",
            Self::Subjects => "filterableValues.source.subjects.concepts.id",
            Self::ProductionDates => "filterableValues.source.production.dates.range.from",
            Self::Color => "",
        }
    }

    fn paired(self) -> Option<ImageAggregation> {
        match self {
            Self::License => Some(ImageAggregation::License),
            Self::ContributorsLabel => Some(ImageAggregation::ContributorsLabel),
            Self::Contributors => Some(ImageAggregation::Contributors),
            Self::GenresLabel => Some(ImageAggregation::GenresLabel),
            Self::Genres => Some(ImageAggregation::Genres),
            Self::SubjectsLabel => Some(ImageAggregation::SubjectsLabel),
            Self::Subjects => Some(ImageAggregation::Subjects),
            Self::ProductionDates | Self::Color => None,
        }
    }
}

registry! {
    pub enum ImageAggregation {
        License => "locations.license",
        ContributorsLabel => "source.contributors.agent.label",
        Contributors => "source.contributors.agent",
        GenresLabel => "source.genres.label",
        Genres => "source.genres",
        SubjectsLabel => "source.subjects.label",
        Subjects => "source.subjects",
    }
}

impl AggregationField for ImageAggregation {
    fn params(self) -> AggregationParams {
        use BucketShape::{LabelOnly, LabeledId};
        match self {
            Self::License => params(
                "license",
                "aggregatableValues.locations.license",
                20,
                LabeledId,
                "License",
            ),
            Self::ContributorsLabel => params(
                "contributorsLabel",
                "aggregatableValues.source.contributors.agent",
                20,
                LabelOnly,
                "Agent",
            ),
            Self::Contributors => params(
                "contributors",
                "aggregatableValues.source.contributors.agent",
                20,
                LabeledId,
                "Agent",
            ),
            Self::GenresLabel => params(
                "genresLabel",
                "aggregatableValues.source.genres",
                20,
                LabelOnly,
                "Genre",
            ),
            Self::Genres => params("genres", "aggregatableValues.source.genres", 20, LabeledId, "Genre"),
            Self::SubjectsLabel => params(
                "subjectsLabel",
                "aggregatableValues.source.subjects",
                20,
                LabelOnly,
                "Subject",
            ),
            Self::Subjects => params(
                "subjects",
                "aggregatableValues.source.subjects",
                20,
                LabeledId,
                "Subject",
            ),
        }
    }

    fn response_key(self) -> &'static str {
        match self {
            Self::License => "license",
            other => other.name(),
        }
    }
}

registry! {
    pub enum ImageInclude {
        WithSimilarFeatures => "withSimilarFeatures",
        SourceContributors => "source.contributors",
        SourceLanguages => "source.languages",
        SourceGenres => "source.genres",
        SourceSubjects => "source.subjects",
    }
}

registry! {
    pub enum ImageSort {
        ProductionDates => "source.production.dates",
    }
}

impl SortField for ImageSort {
    fn path(self) -> &'static str {
        match self {
            Self::ProductionDates => "filterableValues.source.production.dates.range.from",
        }
    }
}
