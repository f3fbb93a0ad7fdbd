pub const IGNORE_LABEL_ID: i64 = -100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanCategory {
    Header,
    Table,
}

impl SpanCategory {
    // Table wins over header when both flags are set.
    pub fn from_flags(is_header: bool, in_table: bool) -> Option<Self> {
        if in_table {
            Some(SpanCategory::Table)
        } else if is_header {
            Some(SpanCategory::Header)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BioLabel {
    Outside,
    HeaderBegin,
    HeaderInside,
    TableBegin,
    TableInside,
}

impl BioLabel {
    pub const ALL: [BioLabel; 5] = [
        BioLabel::Outside,
        BioLabel::HeaderBegin,
        BioLabel::HeaderInside,
        BioLabel::TableBegin,
        BioLabel::TableInside,
    ];

    pub fn id(self) -> i64 {
        match self {
            BioLabel::Outside => 0,
            BioLabel::HeaderBegin => 1,
            BioLabel::HeaderInside => 2,
            BioLabel::TableBegin => 3,
            BioLabel::TableInside => 4,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(BioLabel::Outside),
            1 => Some(BioLabel::HeaderBegin),
            2 => Some(BioLabel::HeaderInside),
            3 => Some(BioLabel::TableBegin),
            4 => Some(BioLabel::TableInside),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BioLabel::Outside => "O",
            BioLabel::HeaderBegin => "B-HEADER",
            BioLabel::HeaderInside => "I-HEADER",
            BioLabel::TableBegin => "B-TABLE",
            BioLabel::TableInside => "I-TABLE",
        }
    }

    pub fn category(self) -> Option<SpanCategory> {
        match self {
            BioLabel::Outside => None,
            BioLabel::HeaderBegin | BioLabel::HeaderInside => Some(SpanCategory::Header),
            BioLabel::TableBegin | BioLabel::TableInside => Some(SpanCategory::Table),
        }
    }

    fn begin(category: SpanCategory) -> Self {
        match category {
            SpanCategory::Header => BioLabel::HeaderBegin,
            SpanCategory::Table => BioLabel::TableBegin,
        }
    }

    fn inside(category: SpanCategory) -> Self {
        match category {
            SpanCategory::Header => BioLabel::HeaderInside,
            SpanCategory::Table => BioLabel::TableInside,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLabel {
    Ignore,
    Bio(BioLabel),
}

impl TokenLabel {
    pub fn id(self) -> i64 {
        match self {
            TokenLabel::Ignore => IGNORE_LABEL_ID,
            TokenLabel::Bio(label) => label.id(),
        }
    }
}

pub fn synthesize_labels(categories: &[Option<SpanCategory>]) -> Vec<BioLabel> {
    let mut labels = Vec::with_capacity(categories.len());
    let mut previous: Option<SpanCategory> = None;

    for &category in categories {
        let label = match category {
            None => BioLabel::Outside,
            Some(current) if previous == Some(current) => BioLabel::inside(current),
            Some(current) => BioLabel::begin(current),
        };

        labels.push(label);
        previous = category;
    }

    labels
}
