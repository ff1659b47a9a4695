use hcl::{Expression, Traversal, TraversalOperator};

const CONTINENT_SHORT_NAMES: &[(&str, &str)] = &[
    ("africa", "af"),
    ("asia", "az"),
    ("australia", "au"),
    ("europe", "eu"),
    ("northamerica", "na"),
    ("southamerica", "sa"),
    ("us", "us"),
    ("me", "me"),
];

const DIRECTIONS: &[&str] = &["north", "south", "east", "west", "central"];

const INTERNAL_PREFIXES: &[&str] = &["setup_", "ez_"];

/// Lowercase, `.` and `_` become `-`
pub fn clean_res_id(name: &str) -> String {
    name.to_lowercase().replace(['.', '_'], "-")
}

/// Folder path as identifier part
///
/// `""` is the organization, `/a/b` becomes `a__b`
pub fn clean_tf_folder(name: &str) -> String {
    if name.is_empty() {
        return "org".to_string();
    }
    name.strip_prefix('/').unwrap_or(name).replace('/', "__")
}

/// Principal as identifier part
///
/// Workload/workforce identity principals keep their last path segment only.
pub fn clean_principal_id(name: &str) -> String {
    if name.starts_with("principalSet:") || name.starts_with("principal:") {
        return name.rsplit('/').next().unwrap_or(name).to_string();
    }
    name.replace(':', "_").replace(['.', '@'], "")
}

/// Short region or zone name, `us-central1` becomes `usc1`
///
/// Unknown continents are kept as is.
pub fn short_region(region: &str) -> String {
    let mut parts = region.split('-');
    let Some(continent) = parts.next() else {
        return region.to_string();
    };

    let mut short = CONTINENT_SHORT_NAMES
        .iter()
        .find(|(long, _)| *long == continent)
        .map(|(_, short)| short.to_string())
        .unwrap_or_else(|| continent.to_string());

    if let Some(location) = parts.next() {
        short.push_str(&shorten_directions(location));
    }
    for rest in parts {
        short.push_str(rest);
    }
    short
}

fn shorten_directions(location: &str) -> String {
    let mut short = String::new();
    let mut rest = location;
    'outer: while !rest.is_empty() {
        for direction in DIRECTIONS {
            if let Some(tail) = rest.strip_prefix(direction) {
                short.push_str(&direction[..1]);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            short.push(c);
        }
        rest = chars.as_str();
    }
    short
}

/// Setup values like `setup_project_id` are provided but never declared as variables
pub fn is_internal_variable(name: &str) -> bool {
    INTERNAL_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Human readable variable description, `billing_id` becomes `billing id`
pub fn description(name: &str) -> String {
    name.replace('_', " ")
}

/// Turn an arbitrary string into a valid block label
pub fn block_id(name: &str) -> String {
    hcl::Identifier::sanitized(name).to_string()
}

/// Whether `name` can be used unquoted as object key
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

pub(crate) trait TraversalExt {
    fn get_longest_path(&self) -> Vec<String>;
}

impl TraversalExt for Traversal {
    /// Root variable and the attribute accesses directly following it
    ///
    /// `module.nw_vpc1.subnets["r/s"].self_link` yields `[module, nw_vpc1, subnets]`.
    fn get_longest_path(&self) -> Vec<String> {
        let Expression::Variable(var) = &self.expr else {
            return vec![];
        };

        let mut path = vec![var.as_str().to_string()];
        for operator in &self.operators {
            let TraversalOperator::GetAttr(ident) = operator else {
                break;
            };

            path.push(ident.as_str().to_string());
        }

        path
    }
}
