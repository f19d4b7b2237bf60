//! # Reporting
//!
//! Read-only shapes returned by the statistics endpoints, plus the pure
//! pieces they need: date-range parsing and time bucketing.
//!
//! ## Sales Report Bucketing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  groupBy=day                                                            │
//! │                                                                         │
//! │  2024-05-02 10:15  sale 3000 / profit 1200 ─┐                           │
//! │  2024-05-02 18:40  sale 1000 / profit  400 ─┴─► 2024-05-02: 4000 / 1600 │
//! │  2024-05-01 09:00  sale 2500 / profit  900 ───► 2024-05-01: 2500 /  900 │
//! │                                                                         │
//! │  Rows come back newest bucket first.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Debtor, PaymentMethod, Sale};

// =============================================================================
// Date Range
// =============================================================================

/// Inclusive creation-time window. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Parses `startDate` / `endDate` query values.
    ///
    /// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates. A plain end
    /// date covers that whole day.
    ///
    /// ## Example
    /// ```rust
    /// use ombor_core::report::DateRange;
    ///
    /// let range = DateRange::parse(Some("2024-05-01"), Some("2024-05-01")).unwrap();
    /// assert_eq!(range.start.unwrap().to_rfc3339(), "2024-05-01T00:00:00+00:00");
    /// assert!(range.end.unwrap() > range.start.unwrap());
    /// ```
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, ValidationError> {
        let start = match non_empty(start) {
            Some(raw) => Some(parse_bound(raw, "startDate", false)?),
            None => None,
        };
        let end = match non_empty(end) {
            Some(raw) => Some(parse_bound(raw, "endDate", true)?),
            None => None,
        };

        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(ValidationError::InvalidFormat {
                    field: "endDate".to_string(),
                    reason: "must not be before startDate".to_string(),
                });
            }
        }

        Ok(DateRange { start, end })
    }

    /// The calendar day containing `at`, in `at`'s time zone.
    pub fn day_of<Tz: TimeZone>(at: DateTime<Tz>) -> Self {
        let tz = at.timezone();
        let date = at.date_naive();
        let midnight = date
            .and_time(NaiveTime::MIN)
            .and_local_timezone(tz)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| at.with_timezone(&Utc));
        DateRange {
            start: Some(midnight),
            end: Some(midnight + Duration::days(1) - Duration::nanoseconds(1)),
        }
    }

    /// Everything from `days` days before `now` onwards.
    pub fn last_days(now: DateTime<Utc>, days: i64) -> Self {
        DateRange {
            start: Some(now - Duration::days(days)),
            end: None,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_bound(raw: &str, field: &str, end_of_day: bool) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected YYYY-MM-DD or an RFC 3339 timestamp".to_string(),
        }
    })?;

    let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    if end_of_day {
        Ok(midnight + Duration::days(1) - Duration::nanoseconds(1))
    } else {
        Ok(midnight)
    }
}

// =============================================================================
// Time Buckets
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum TimeBucket {
    #[default]
    Day,
    Month,
    Year,
}

impl FromStr for TimeBucket {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "day" => Ok(TimeBucket::Day),
            "month" => Ok(TimeBucket::Month),
            "year" => Ok(TimeBucket::Year),
            _ => Err(ValidationError::NotAllowed {
                field: "groupBy".to_string(),
                allowed: vec!["day".into(), "month".into(), "year".into()],
            }),
        }
    }
}

impl TimeBucket {
    pub fn period(&self, at: DateTime<Utc>) -> ReportPeriod {
        match self {
            TimeBucket::Day => ReportPeriod {
                year: at.year(),
                month: Some(at.month()),
                day: Some(at.day()),
            },
            TimeBucket::Month => ReportPeriod {
                year: at.year(),
                month: Some(at.month()),
                day: None,
            },
            TimeBucket::Year => ReportPeriod {
                year: at.year(),
                month: None,
                day: None,
            },
        }
    }
}

/// Bucket key; fields coarser than the bucket are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, TS)]
#[ts(export)]
pub struct ReportPeriod {
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

impl ReportPeriod {
    /// `2024`, `2024-05` or `2024-05-02`.
    pub fn label(&self) -> String {
        match (self.month, self.day) {
            (Some(m), Some(d)) => format!("{:04}-{:02}-{:02}", self.year, m, d),
            (Some(m), None) => format!("{:04}-{:02}", self.year, m),
            _ => format!("{:04}", self.year),
        }
    }
}

/// One sale-type transaction fed into the sales report.
#[derive(Debug, Clone, Copy)]
pub struct ReportSample {
    pub at: DateTime<Utc>,
    pub amount: Money,
    pub profit: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SalesReportRow {
    pub period: ReportPeriod,
    pub date: String,
    pub total_sales: Money,
    pub total_profit: Money,
    pub transaction_count: i64,
}

/// Groups samples into buckets, newest bucket first.
pub fn sales_report<I>(bucket: TimeBucket, samples: I) -> Vec<SalesReportRow>
where
    I: IntoIterator<Item = ReportSample>,
{
    let mut groups: BTreeMap<ReportPeriod, (Money, Money, i64)> = BTreeMap::new();
    for sample in samples {
        let entry = groups
            .entry(bucket.period(sample.at))
            .or_insert((Money::zero(), Money::zero(), 0));
        entry.0 += sample.amount;
        entry.1 += sample.profit;
        entry.2 += 1;
    }

    groups
        .into_iter()
        .rev()
        .map(|(period, (total_sales, total_profit, count))| SalesReportRow {
            date: period.label(),
            period,
            total_sales,
            total_profit,
            transaction_count: count,
        })
        .collect()
}

// =============================================================================
// Product Statistics
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductStats {
    pub total_products: i64,
    pub low_stock_products: i64,
    pub out_of_stock_products: i64,
    /// Σ quantity × price
    pub total_value: Money,
}

// =============================================================================
// Transaction Statistics
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TransactionStats {
    pub total_sales: Money,
    pub total_purchases: Money,
    pub total_profit: Money,
    pub total_transactions: i64,
    pub sale_count: i64,
    pub purchase_count: i64,
    pub return_count: i64,
}

// =============================================================================
// Sale Statistics
// =============================================================================

/// Totals per payment method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentTotals {
    pub cash: Money,
    pub credit: Money,
    pub card: Money,
    pub transfer: Money,
}

impl PaymentTotals {
    pub fn add(&mut self, method: PaymentMethod, amount: Money) {
        match method {
            PaymentMethod::Cash => self.cash += amount,
            PaymentMethod::Credit => self.credit += amount,
            PaymentMethod::Card => self.card += amount,
            PaymentMethod::Transfer => self.transfer += amount,
        }
    }
}

/// Today's sales with running totals.
#[derive(Debug, Clone, Default, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TodaySales {
    pub total_sales: Money,
    /// Number of sale lines across all of today's sales.
    pub total_items: i64,
    pub payment_stats: PaymentTotals,
    pub sales: Vec<Sale>,
}

impl TodaySales {
    pub fn from_sales(sales: Vec<Sale>) -> Self {
        let mut payment_stats = PaymentTotals::default();
        for sale in &sales {
            payment_stats.add(sale.payment_method, sale.total_amount);
        }
        TodaySales {
            total_sales: sales.iter().map(|s| s.total_amount).sum(),
            total_items: sales.iter().map(|s| s.items.len() as i64).sum(),
            payment_stats,
            sales,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleOverview {
    pub total_sales: Money,
    pub count: i64,
    pub avg_sale: Money,
    pub cash_sales: Money,
    pub card_sales: Money,
    pub credit_sales: Money,
    pub transfer_sales: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DailySales {
    /// `YYYY-MM-DD`
    pub date: String,
    pub total_sales: Money,
    pub count: i64,
}

/// Per-day series, oldest first.
pub fn daily_series<I>(samples: I) -> Vec<DailySales>
where
    I: IntoIterator<Item = (DateTime<Utc>, Money)>,
{
    let mut days: BTreeMap<ReportPeriod, (Money, i64)> = BTreeMap::new();
    for (at, amount) in samples {
        let entry = days
            .entry(TimeBucket::Day.period(at))
            .or_insert((Money::zero(), 0));
        entry.0 += amount;
        entry.1 += 1;
    }
    days.into_iter()
        .map(|(period, (total_sales, count))| DailySales {
            date: period.label(),
            total_sales,
            count,
        })
        .collect()
}

/// Credit sale totals for one debtor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DebtorCreditStat {
    pub debtor_id: String,
    /// `None` when the debtor has since been deleted.
    pub debtor_name: Option<String>,
    pub debtor_phone: Option<String>,
    pub total_credit: Money,
    pub sale_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleStats {
    pub overview: SaleOverview,
    pub daily_stats: Vec<DailySales>,
    pub debtor_stats: Vec<DebtorCreditStat>,
}

/// A debtor with every sale charged to them.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DebtorSales {
    pub debtor: Debtor,
    /// Newest first.
    pub sales: Vec<Sale>,
    pub count: i64,
    pub total_amount: Money,
}

impl DebtorSales {
    pub fn new(debtor: Debtor, sales: Vec<Sale>) -> Self {
        DebtorSales {
            count: sales.len() as i64,
            total_amount: sales.iter().map(|s| s.total_amount).sum(),
            debtor,
            sales,
        }
    }
}

// =============================================================================
// Debtor Statistics
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DebtorStats {
    pub total_debtors: i64,
    /// debtAmount > 0
    pub active_debtors: i64,
    pub paid_debtors: i64,
    pub total_debt: Money,
    /// total_debt / active_debtors
    pub average_debt: Money,
}

impl DebtorStats {
    pub fn new(total_debtors: i64, active_debtors: i64, total_debt: Money) -> Self {
        DebtorStats {
            total_debtors,
            active_debtors,
            paid_debtors: total_debtors - active_debtors,
            total_debt,
            average_debt: total_debt.average(active_debtors),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn sample(s: &str, amount: i64, profit: i64) -> ReportSample {
        ReportSample {
            at: at(s),
            amount: Money::from_minor(amount),
            profit: Money::from_minor(profit),
        }
    }

    #[test]
    fn test_date_only_end_is_inclusive() {
        let range = DateRange::parse(Some("2024-05-01"), Some("2024-05-01")).unwrap();
        assert!(range.contains(at("2024-05-01T00:00:00Z")));
        assert!(range.contains(at("2024-05-01T23:59:59Z")));
        assert!(!range.contains(at("2024-05-02T00:00:00Z")));
        assert!(!range.contains(at("2024-04-30T23:59:59Z")));
    }

    #[test]
    fn test_rfc3339_bounds_and_open_range() {
        let range = DateRange::parse(Some("2024-05-01T10:00:00+05:00"), None).unwrap();
        assert_eq!(range.start, Some(at("2024-05-01T05:00:00Z")));
        assert!(range.end.is_none());
        assert_eq!(DateRange::parse(None, Some("  ")).unwrap(), DateRange::default());
    }

    #[test]
    fn test_invalid_dates_rejected() {
        assert!(DateRange::parse(Some("yesterday"), None).is_err());
        assert!(DateRange::parse(Some("2024-05-02"), Some("2024-05-01")).is_err());
    }

    #[test]
    fn test_day_of_uses_local_midnight() {
        let tashkent = FixedOffset::east_opt(5 * 3600).unwrap();
        let now = tashkent.with_ymd_and_hms(2024, 5, 2, 1, 30, 0).unwrap();
        let range = DateRange::day_of(now);
        assert_eq!(range.start, Some(at("2024-05-01T19:00:00Z")));
        assert!(range.contains(at("2024-05-02T18:59:59Z")));
        assert!(!range.contains(at("2024-05-02T19:00:00Z")));
    }

    #[test]
    fn test_time_bucket_parse() {
        assert_eq!("".parse::<TimeBucket>().unwrap(), TimeBucket::Day);
        assert_eq!("Month".parse::<TimeBucket>().unwrap(), TimeBucket::Month);
        assert!("week".parse::<TimeBucket>().is_err());
    }

    #[test]
    fn test_sales_report_groups_newest_first() {
        let rows = sales_report(
            TimeBucket::Day,
            vec![
                sample("2024-05-01T09:00:00Z", 2500, 900),
                sample("2024-05-02T10:15:00Z", 3000, 1200),
                sample("2024-05-02T18:40:00Z", 1000, 400),
            ],
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "2024-05-02");
        assert_eq!(rows[0].total_sales.minor(), 4000);
        assert_eq!(rows[0].total_profit.minor(), 1600);
        assert_eq!(rows[0].transaction_count, 2);
        assert_eq!(rows[1].date, "2024-05-01");
    }

    #[test]
    fn test_sales_report_by_year() {
        let rows = sales_report(
            TimeBucket::Year,
            vec![
                sample("2023-12-31T09:00:00Z", 100, 10),
                sample("2024-01-01T09:00:00Z", 200, 20),
                sample("2024-07-01T09:00:00Z", 300, 30),
            ],
        );
        assert_eq!(rows[0].date, "2024");
        assert_eq!(rows[0].total_sales.minor(), 500);
        assert_eq!(rows[1].period.month, None);
    }

    #[test]
    fn test_daily_series_oldest_first() {
        let series = daily_series(vec![
            (at("2024-05-03T08:00:00Z"), Money::from_minor(10)),
            (at("2024-05-01T08:00:00Z"), Money::from_minor(20)),
            (at("2024-05-03T09:00:00Z"), Money::from_minor(5)),
        ]);
        assert_eq!(series[0].date, "2024-05-01");
        assert_eq!(series[1].total_sales.minor(), 15);
        assert_eq!(series[1].count, 2);
    }

    #[test]
    fn test_debtor_stats_average() {
        let stats = DebtorStats::new(5, 2, Money::from_minor(9000));
        assert_eq!(stats.paid_debtors, 3);
        assert_eq!(stats.average_debt.minor(), 4500);

        let empty = DebtorStats::new(0, 0, Money::zero());
        assert!(empty.average_debt.is_zero());
    }

    #[test]
    fn test_payment_totals() {
        let mut totals = PaymentTotals::default();
        totals.add(PaymentMethod::Cash, Money::from_minor(100));
        totals.add(PaymentMethod::Credit, Money::from_minor(50));
        totals.add(PaymentMethod::Cash, Money::from_minor(25));
        assert_eq!(totals.cash.minor(), 125);
        assert_eq!(totals.credit.minor(), 50);
        assert!(totals.card.is_zero());
    }
}
