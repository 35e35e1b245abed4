//! Intent matching and query building
//!
//! Maps a question onto one of a fixed set of query templates. Rules are
//! kept in an ordered slice and evaluated in a single pass; the first rule
//! whose trigger matches and whose builder accepts the question wins.
//!
//! Values pulled out of the question (city, department, price threshold)
//! always travel as bound parameters. The only literals embedded in query
//! text are dates produced by [`TimeResolver`].

use crate::schema::TableSet;
use crate::time::{DateRange, TimeResolver};
use chrono::Datelike;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

pub const UNSUPPORTED_QUERY: &str =
    "Unsupported query type. Please ask about customers, employees, products, or sales.";

/// Departments accepted by the department filter.
pub const KNOWN_DEPARTMENTS: &[&str] = &["sales", "support", "hr", "tech"];

lazy_static! {
    static ref LISTING_RE: Regex = Regex::new(
        r"(?:list(?:\s+all)?|show\s+all|all)\s+(customers|employees|products|sales)\b"
    )
    .unwrap();
    static ref CITY_RE: Regex = Regex::new(r"\bcustomers from\s+(.+)$").unwrap();
    static ref CITY_VALUE_RE: Regex = Regex::new(r"^\p{L}[\p{L} .'-]*$").unwrap();
    static ref DEPARTMENT_RE: Regex =
        Regex::new(r"\bemployees in\s+(?:the\s+)?([a-z]+)\b").unwrap();
    static ref PRICE_RE: Regex =
        Regex::new(r"\bproducts above\s+(\d+(?:\.\d+)?)\b").unwrap();
    static ref TOP_EMPLOYEE_RE: Regex = Regex::new(
        r"\b(?:top|best) employee\b|\bemployee with (?:the )?highest sales\b|\bhighest sales employee\b"
    )
    .unwrap();
    static ref TOP_FIVE_EMPLOYEES_RE: Regex =
        Regex::new(r"\btop (?:5 |five )?employees\b").unwrap();
    static ref TOP_PRODUCT_RE: Regex = Regex::new(
        r"\bproduct with (?:the )?highest revenue\b|\btop product\b|\bhighest revenue product\b"
    )
    .unwrap();
}

/// Positional value bound to a `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Text(String),
    Integer(i64),
    Decimal(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentCategory {
    Listing,
    AttributeFilter,
    Aggregation,
    Join,
    TemporalShortcut,
    TemporalListing,
}

/// Output of the matcher: either a query with its parameters, or an error.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDirective {
    pub sql: Option<String>,
    pub params: Vec<QueryParam>,
    pub error: Option<String>,
    pub category: Option<IntentCategory>,
    pub rule: Option<&'static str>,
}

impl QueryDirective {
    fn query(rule: &IntentRule, query: Query) -> Self {
        Self {
            sql: Some(query.sql),
            params: query.params,
            error: None,
            category: Some(rule.category),
            rule: Some(rule.name),
        }
    }

    fn unsupported() -> Self {
        Self {
            sql: None,
            params: Vec::new(),
            error: Some(UNSUPPORTED_QUERY.to_string()),
            category: None,
            rule: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

struct Query {
    sql: String,
    params: Vec<QueryParam>,
}

impl Query {
    fn literal(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    fn bound(sql: impl Into<String>, param: QueryParam) -> Self {
        Self {
            sql: sql.into(),
            params: vec![param],
        }
    }
}

/// What a rule sees while deciding and building.
struct MatchContext<'a> {
    question: &'a str,
    range: Option<DateRange>,
    resolver: &'a TimeResolver,
}

/// One entry of the ordered rule list.
struct IntentRule {
    name: &'static str,
    category: IntentCategory,
    /// Tables the produced query reads.
    tables: &'static [&'static str],
    matches: fn(&str) -> bool,
    /// May still decline (e.g. a department outside the known set); the
    /// matcher then moves on to the next rule.
    build: fn(&MatchContext) -> Option<Query>,
}

const RULES: &[IntentRule] = &[
    // 1. direct listing
    IntentRule {
        name: "direct_listing",
        category: IntentCategory::Listing,
        tables: &["customers", "employees", "products", "sales"],
        matches: |q| LISTING_RE.is_match(q),
        build: build_listing,
    },
    // 2. attribute filters
    IntentRule {
        name: "customers_by_city",
        category: IntentCategory::AttributeFilter,
        tables: &["customers"],
        matches: |q| q.contains("customers from"),
        build: build_city_filter,
    },
    IntentRule {
        name: "employees_by_department",
        category: IntentCategory::AttributeFilter,
        tables: &["employees"],
        matches: |q| q.contains("employees in"),
        build: build_department_filter,
    },
    IntentRule {
        name: "products_above_price",
        category: IntentCategory::AttributeFilter,
        tables: &["products"],
        matches: |q| q.contains("products above"),
        build: build_price_filter,
    },
    // 3. aggregations over sales
    IntentRule {
        name: "total_sales",
        category: IntentCategory::Aggregation,
        tables: &["sales"],
        matches: |q| contains_any(q, &["total sales", "total revenue", "sum of sales"]),
        build: |ctx| Some(aggregate("SUM(sale_amount) AS total_sales", ctx.range)),
    },
    IntentRule {
        name: "sales_count",
        category: IntentCategory::Aggregation,
        tables: &["sales"],
        matches: |q| contains_any(q, &["how many sales", "count sales", "count of sales"]),
        build: |ctx| Some(aggregate("COUNT(*) AS count", ctx.range)),
    },
    IntentRule {
        name: "average_sale",
        category: IntentCategory::Aggregation,
        tables: &["sales"],
        matches: |q| contains_any(q, &["average sale", "avg sale"]),
        build: |ctx| Some(aggregate("AVG(sale_amount) AS avg_sale", ctx.range)),
    },
    // 4. joins
    IntentRule {
        name: "top_employee_by_sales",
        category: IntentCategory::Join,
        tables: &["employees", "sales"],
        matches: |q| TOP_EMPLOYEE_RE.is_match(q),
        build: |_| Some(Query::literal(top_employees_sql(1))),
    },
    IntentRule {
        name: "top_five_employees_by_sales",
        category: IntentCategory::Join,
        tables: &["employees", "sales"],
        matches: |q| TOP_FIVE_EMPLOYEES_RE.is_match(q),
        build: |_| Some(Query::literal(top_employees_sql(5))),
    },
    IntentRule {
        name: "sales_with_customer_names",
        category: IntentCategory::Join,
        tables: &["sales", "customers"],
        matches: |q| {
            contains_any(
                q,
                &["sales with customer names", "sales with customers", "sales with customer name"],
            )
        },
        build: |_| {
            Some(Query::literal(
                "SELECT s.id, c.name AS customer_name, s.sale_amount, s.sale_date \
                 FROM sales s \
                 JOIN customers c ON s.customer_id = c.id \
                 ORDER BY s.id",
            ))
        },
    },
    IntentRule {
        name: "top_product_by_revenue",
        category: IntentCategory::Join,
        tables: &["products", "sales"],
        matches: |q| TOP_PRODUCT_RE.is_match(q),
        build: |_| {
            Some(Query::literal(
                "SELECT p.id, p.name, p.category, SUM(s.sale_amount) AS total_revenue \
                 FROM products p \
                 JOIN sales s ON p.id = s.product_id \
                 GROUP BY p.id, p.name, p.category \
                 ORDER BY total_revenue DESC, p.id ASC \
                 LIMIT 1",
            ))
        },
    },
    // 5. temporal
    IntentRule {
        name: "sales_last_year",
        category: IntentCategory::TemporalShortcut,
        tables: &["sales"],
        matches: |q| q.contains("sales last year"),
        build: build_sales_last_year,
    },
    IntentRule {
        name: "sales_in_period",
        category: IntentCategory::TemporalListing,
        tables: &["sales"],
        matches: |q| q.contains("sale"),
        build: |ctx| {
            ctx.range.map(|range| {
                Query::literal(format!(
                    "SELECT * FROM sales{} ORDER BY sale_date",
                    date_condition(Some(range))
                ))
            })
        },
    },
];

fn contains_any(question: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| question.contains(p))
}

fn build_listing(ctx: &MatchContext) -> Option<Query> {
    let caps = LISTING_RE.captures(ctx.question)?;
    let table = match &caps[1] {
        "customers" => "customers",
        "employees" => "employees",
        "products" => "products",
        "sales" => "sales",
        _ => return None,
    };
    Some(Query::literal(format!("SELECT * FROM {}", table)))
}

fn build_city_filter(ctx: &MatchContext) -> Option<Query> {
    let caps = CITY_RE.captures(ctx.question)?;
    let city = caps[1]
        .trim_end_matches(|c: char| c == '?' || c == '.' || c == '!' || c.is_whitespace())
        .trim();
    if !CITY_VALUE_RE.is_match(city) {
        return None;
    }
    Some(Query::bound(
        "SELECT * FROM customers WHERE LOWER(city) = LOWER($1)",
        QueryParam::Text(city.to_string()),
    ))
}

fn build_department_filter(ctx: &MatchContext) -> Option<Query> {
    let caps = DEPARTMENT_RE.captures(ctx.question)?;
    let department = KNOWN_DEPARTMENTS
        .iter()
        .find(|d| **d == &caps[1])?;
    Some(Query::bound(
        "SELECT * FROM employees WHERE LOWER(department) = LOWER($1)",
        QueryParam::Text(department.to_string()),
    ))
}

fn build_price_filter(ctx: &MatchContext) -> Option<Query> {
    let caps = PRICE_RE.captures(ctx.question)?;
    let raw = &caps[1];
    let threshold = if raw.contains('.') {
        QueryParam::Decimal(raw.parse().ok()?)
    } else {
        QueryParam::Integer(raw.parse().ok()?)
    };
    Some(Query::bound(
        "SELECT * FROM products WHERE price > $1",
        threshold,
    ))
}

fn build_sales_last_year(ctx: &MatchContext) -> Option<Query> {
    let year = ctx.resolver.today().year() - 1;
    Some(Query::literal(format!(
        "SELECT SUM(sale_amount) AS total_sales FROM sales \
         WHERE sale_date BETWEEN '{year}-01-01' AND '{year}-12-31'"
    )))
}

fn aggregate(select: &str, range: Option<DateRange>) -> Query {
    Query::literal(format!(
        "SELECT {} FROM sales{}",
        select,
        date_condition(range)
    ))
}

/// ` WHERE sale_date BETWEEN ...`, or nothing when there is no interval.
fn date_condition(range: Option<DateRange>) -> String {
    match range {
        Some(r) => format!(
            " WHERE sale_date BETWEEN '{}' AND '{}'",
            r.start_str(),
            r.end_str()
        ),
        None => String::new(),
    }
}

fn top_employees_sql(limit: u32) -> String {
    format!(
        "SELECT e.id, e.name, e.department, SUM(s.sale_amount) AS total_sales \
         FROM employees e \
         JOIN sales s ON e.id = s.employee_id \
         GROUP BY e.id, e.name, e.department \
         ORDER BY total_sales DESC, e.id ASC \
         LIMIT {}",
        limit
    )
}

/// Ordered rule matcher.
#[derive(Debug, Clone, Copy)]
pub struct IntentMatcher {
    resolver: TimeResolver,
}

impl IntentMatcher {
    pub fn new(resolver: TimeResolver) -> Self {
        Self { resolver }
    }

    /// Rule names in evaluation order.
    pub fn rules() -> Vec<&'static str> {
        RULES.iter().map(|r| r.name).collect()
    }

    /// Every table some rule can query.
    pub fn referenced_tables() -> Vec<&'static str> {
        let mut tables: Vec<&'static str> =
            RULES.iter().flat_map(|r| r.tables.iter().copied()).collect();
        tables.sort_unstable();
        tables.dedup();
        tables
    }

    pub fn build(&self, question: &str, relevant: &TableSet) -> QueryDirective {
        let q = question.trim().to_lowercase();
        let ctx = MatchContext {
            question: &q,
            range: self.resolver.resolve(&q),
            resolver: &self.resolver,
        };
        debug!(range = ?ctx.range, "Resolved temporal interval");

        for rule in RULES {
            if !(rule.matches)(&q) {
                continue;
            }
            let Some(query) = (rule.build)(&ctx) else {
                debug!(rule = rule.name, "Rule triggered but declined");
                continue;
            };
            if rule.tables.iter().all(|t| !relevant.contains_key(t)) {
                debug!(rule = rule.name, "Rule reads none of the relevant tables");
            }
            debug!(rule = rule.name, category = ?rule.category, "Intent matched");
            return QueryDirective::query(rule, query);
        }

        warn!("No intent rule matched the question");
        QueryDirective::unsupported()
    }
}
