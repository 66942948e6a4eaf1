//! Admin-only aggregate reports. Nothing here is cached; every call runs its
//! queries in parallel on separate pooled connections.

use actix_web::{HttpResponse, web};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use diesel::PgConnection;
use diesel::dsl::{avg, count_star, sum};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text, Timestamptz};
use futures::try_join;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::ok;
use crate::auth::CurrentUser;
use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::models::{AppointmentStatus, Doctor, ResultStatus, Role, UserSummary};
use crate::schema::{appointments, bills, doctors, feedback, lab_results, patients, prescriptions, users};
use crate::validation::Validator;

const ACTIVE_PRESCRIPTION_DAYS: i64 = 30;
const TOP_MEDICATIONS: i64 = 10;

/// `completed / total` as a percentage with two decimals, `"0.00"` when
/// there is nothing to rate.
fn completion_rate(completed: i64, total: i64) -> String {
    if total <= 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", completed as f64 / total as f64 * 100.0)
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentStats {
    pub total: i64,
    pub scheduled: i64,
    pub confirmed: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub no_show: i64,
    pub completion_rate: String,
}

impl AppointmentStats {
    fn from_counts(counts: &[(AppointmentStatus, i64)]) -> Self {
        let mut stats = AppointmentStats::default();
        for &(status, n) in counts {
            stats.total += n;
            match status {
                AppointmentStatus::Scheduled => stats.scheduled += n,
                AppointmentStatus::Confirmed => stats.confirmed += n,
                AppointmentStatus::Completed => stats.completed += n,
                AppointmentStatus::Cancelled => stats.cancelled += n,
                AppointmentStatus::NoShow => stats.no_show += n,
            }
        }
        stats.completion_rate = completion_rate(stats.completed, stats.total);
        stats
    }
}

fn appointment_stats(conn: &mut PgConnection) -> QueryResult<AppointmentStats> {
    let counts: Vec<(AppointmentStatus, i64)> = appointments::table
        .group_by(appointments::status)
        .select((appointments::status, count_star()))
        .load(conn)?;
    Ok(AppointmentStats::from_counts(&counts))
}

fn rounded(value: Option<BigDecimal>) -> BigDecimal {
    value.map(|v| v.round(2)).unwrap_or_default()
}

fn require_admin(user: &CurrentUser) -> Result<(), ApiError> {
    user.require_role(&[Role::Admin])
}

// Handler for the admin dashboard overview
pub async fn dashboard(pool: web::Data<DbPool>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    require_admin(&user)?;

    let (total_users, total_doctors, total_patients, total_appointments, total_revenue, appointment_stats, rating) = try_join!(
        db::run(&pool, |conn| Ok(users::table.count().get_result::<i64>(conn)?)),
        db::run(&pool, |conn| Ok(doctors::table.count().get_result::<i64>(conn)?)),
        db::run(&pool, |conn| Ok(patients::table.count().get_result::<i64>(conn)?)),
        db::run(&pool, |conn| Ok(appointments::table.count().get_result::<i64>(conn)?)),
        db::run(&pool, |conn| {
            Ok(bills::table
                .select(sum(bills::paid_amount))
                .get_result::<Option<BigDecimal>>(conn)?)
        }),
        db::run(&pool, |conn| Ok(appointment_stats(conn)?)),
        db::run(&pool, |conn| {
            Ok(feedback::table
                .select(avg(feedback::rating))
                .get_result::<Option<BigDecimal>>(conn)?)
        }),
    )?;

    Ok(ok(json!({
        "overview": {
            "totalUsers": total_users,
            "totalDoctors": total_doctors,
            "totalPatients": total_patients,
            "totalAppointments": total_appointments,
            "totalRevenue": total_revenue.unwrap_or_default(),
            "averageRating": rounded(rating),
        },
        "appointmentStats": appointment_stats,
        "updatedAt": Utc::now(),
    })))
}

// Handler for appointment counts by status
pub async fn appointment_stats_report(pool: web::Data<DbPool>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    require_admin(&user)?;
    let stats = db::run(&pool, |conn| Ok(appointment_stats(conn)?)).await?;
    Ok(ok(stats))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorPerformance {
    pub doctor_id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub specialty: Option<String>,
    pub total_appointments: i64,
    pub completed_appointments: i64,
    pub cancelled_appointments: i64,
    pub completion_rate: String,
    pub average_rating: BigDecimal,
}

fn rank_by_completion(rows: &mut [DoctorPerformance]) {
    let rate = |row: &DoctorPerformance| row.completion_rate.parse::<f64>().unwrap_or(0.0);
    rows.sort_by(|a, b| rate(b).total_cmp(&rate(a)));
}

// Handler for per-doctor appointment outcomes, best completion rate first
pub async fn doctor_performance(pool: web::Data<DbPool>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    require_admin(&user)?;

    let (staff, counts) = try_join!(
        db::run(&pool, |conn| {
            Ok(doctors::table
                .inner_join(users::table)
                .select((Doctor::as_select(), UserSummary::as_select()))
                .load::<(Doctor, UserSummary)>(conn)?)
        }),
        db::run(&pool, |conn| {
            Ok(appointments::table
                .filter(appointments::doctor_id.is_not_null())
                .group_by((appointments::doctor_id, appointments::status))
                .select((appointments::doctor_id, appointments::status, count_star()))
                .load::<(Option<Uuid>, AppointmentStatus, i64)>(conn)?)
        }),
    )?;

    let mut rows: Vec<DoctorPerformance> = staff
        .into_iter()
        .map(|(doctor, account)| {
            let mine: Vec<(AppointmentStatus, i64)> = counts
                .iter()
                .filter(|(id, _, _)| *id == Some(doctor.doctor_id))
                .map(|&(_, status, n)| (status, n))
                .collect();
            let stats = AppointmentStats::from_counts(&mine);
            DoctorPerformance {
                doctor_id: doctor.doctor_id,
                name: account.full_name,
                email: account.email,
                specialty: doctor.specialty,
                total_appointments: stats.total,
                completed_appointments: stats.completed,
                cancelled_appointments: stats.cancelled,
                completion_rate: stats.completion_rate,
                average_rating: doctor.rating_cache,
            }
        })
        .collect();
    rank_by_completion(&mut rows);

    Ok(ok(rows))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD`. A bare date used
/// as an upper bound covers the whole day.
fn parse_bound(raw: &str, upper: bool) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let time = if upper {
        date.and_hms_micro_opt(23, 59, 59, 999_999)?
    } else {
        date.and_hms_opt(0, 0, 0)?
    };
    Some(time.and_utc())
}

#[derive(Debug, QueryableByName, Serialize)]
#[serde(rename_all = "camelCase")]
struct MonthlyRevenue {
    #[diesel(sql_type = Timestamptz)]
    month: DateTime<Utc>,
    #[diesel(sql_type = diesel::sql_types::Numeric)]
    total_amount: BigDecimal,
    #[diesel(sql_type = BigInt)]
    bill_count: i64,
}

// Handler for billing totals, optionally limited to a payment date range
pub async fn revenue(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    query: web::Query<RevenueQuery>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&user)?;

    let query = query.into_inner();
    let mut v = Validator::new();
    let start = query.start_date.as_deref().and_then(|raw| {
        let bound = parse_bound(raw, false);
        v.check("startDate", bound.is_some(), "startDate must be a date (YYYY-MM-DD) or RFC 3339 timestamp");
        bound
    });
    let end = query.end_date.as_deref().and_then(|raw| {
        let bound = parse_bound(raw, true);
        v.check("endDate", bound.is_some(), "endDate must be a date (YYYY-MM-DD) or RFC 3339 timestamp");
        bound
    });
    v.finish()?;

    let (totals, monthly) = try_join!(
        db::run(&pool, move |conn| {
            let mut filtered = bills::table.into_boxed();
            if let Some(start) = start {
                filtered = filtered.filter(bills::payment_date.ge(start));
            }
            if let Some(end) = end {
                filtered = filtered.filter(bills::payment_date.le(end));
            }
            Ok(filtered
                .select((sum(bills::paid_amount), count_star(), avg(bills::paid_amount)))
                .get_result::<(Option<BigDecimal>, i64, Option<BigDecimal>)>(conn)?)
        }),
        db::run(&pool, |conn| {
            Ok(diesel::sql_query(
                "SELECT DATE_TRUNC('month', payment_date) AS month, \
                        SUM(paid_amount) AS total_amount, \
                        COUNT(*) AS bill_count \
                 FROM bills \
                 WHERE payment_date >= NOW() - INTERVAL '6 months' \
                 GROUP BY 1 ORDER BY 1",
            )
            .load::<MonthlyRevenue>(conn)?)
        }),
    )?;
    let (total_revenue, total_bills, average) = totals;

    Ok(ok(json!({
        "totalRevenue": total_revenue.unwrap_or_default(),
        "totalBills": total_bills,
        "averageBillAmount": rounded(average),
        "monthlyRevenue": monthly,
        "period": {
            "startDate": query.start_date.as_deref().unwrap_or("N/A"),
            "endDate": query.end_date.as_deref().unwrap_or("N/A"),
        },
    })))
}

#[derive(Debug, QueryableByName, Serialize)]
struct MonthlySignups {
    #[diesel(sql_type = Timestamptz)]
    month: DateTime<Utc>,
    #[diesel(sql_type = Text)]
    role: String,
    #[diesel(sql_type = BigInt)]
    count: i64,
}

// Handler for sign-ups over the last six months and the current role mix
pub async fn user_growth(pool: web::Data<DbPool>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    require_admin(&user)?;

    let (monthly, by_role) = try_join!(
        db::run(&pool, |conn| {
            Ok(diesel::sql_query(
                "SELECT DATE_TRUNC('month', created_at) AS month, role, COUNT(*) AS count \
                 FROM users \
                 WHERE created_at >= NOW() - INTERVAL '6 months' \
                 GROUP BY 1, 2 ORDER BY 1, 2",
            )
            .load::<MonthlySignups>(conn)?)
        }),
        db::run(&pool, |conn| {
            Ok(users::table
                .group_by(users::role)
                .select((users::role, count_star()))
                .order(users::role.asc())
                .load::<(Role, i64)>(conn)?)
        }),
    )?;

    let by_role: Vec<_> = by_role
        .into_iter()
        .map(|(role, count)| json!({ "role": role, "count": count }))
        .collect();

    Ok(ok(json!({ "monthlyGrowth": monthly, "usersByRole": by_role })))
}

#[derive(Debug, QueryableByName, Serialize)]
struct MedicationCount {
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = BigInt)]
    count: i64,
}

// Handler for prescription volume and the most prescribed medications
pub async fn prescription_stats(pool: web::Data<DbPool>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    require_admin(&user)?;

    let cutoff = Utc::now() - Duration::days(ACTIVE_PRESCRIPTION_DAYS);
    let (total, active, completed, top) = try_join!(
        db::run(&pool, |conn| Ok(prescriptions::table.count().get_result::<i64>(conn)?)),
        db::run(&pool, move |conn| {
            Ok(prescriptions::table
                .filter(prescriptions::issued_at.ge(cutoff))
                .count()
                .get_result::<i64>(conn)?)
        }),
        db::run(&pool, move |conn| {
            Ok(prescriptions::table
                .filter(prescriptions::issued_at.lt(cutoff))
                .count()
                .get_result::<i64>(conn)?)
        }),
        db::run(&pool, |conn| {
            // Older rows stored the name under `medication_name`.
            Ok(diesel::sql_query(
                "SELECT COALESCE(m->>'name', m->>'medication_name') AS name, COUNT(*) AS count \
                 FROM prescriptions p, \
                      jsonb_array_elements(CASE WHEN jsonb_typeof(p.medications) = 'array' \
                                                THEN p.medications ELSE '[]'::jsonb END) AS m \
                 WHERE COALESCE(m->>'name', m->>'medication_name') IS NOT NULL \
                 GROUP BY 1 ORDER BY 2 DESC, 1 ASC \
                 LIMIT $1",
            )
            .bind::<BigInt, _>(TOP_MEDICATIONS)
            .load::<MedicationCount>(conn)?)
        }),
    )?;

    Ok(ok(json!({
        "totalPrescriptions": total,
        "activePrescriptions": active,
        "completedPrescriptions": completed,
        "topMedications": top,
    })))
}

// Handler for lab test outcomes and volume per test type
pub async fn lab_result_stats(pool: web::Data<DbPool>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    require_admin(&user)?;

    let (total, normal, abnormal, by_type) = try_join!(
        db::run(&pool, |conn| Ok(lab_results::table.count().get_result::<i64>(conn)?)),
        db::run(&pool, |conn| {
            Ok(lab_results::table
                .filter(lab_results::result_status.eq(ResultStatus::Normal))
                .count()
                .get_result::<i64>(conn)?)
        }),
        db::run(&pool, |conn| {
            Ok(lab_results::table
                .filter(lab_results::result_status.eq(ResultStatus::Abnormal))
                .count()
                .get_result::<i64>(conn)?)
        }),
        db::run(&pool, |conn| {
            Ok(lab_results::table
                .filter(lab_results::test_type.is_not_null())
                .group_by(lab_results::test_type)
                .select((lab_results::test_type, count_star()))
                .order(count_star().desc())
                .load::<(Option<String>, i64)>(conn)?)
        }),
    )?;

    let by_type: Vec<_> = by_type
        .into_iter()
        .map(|(test_type, count)| json!({ "testType": test_type, "count": count }))
        .collect();

    Ok(ok(json!({
        "totalTests": total,
        "normalResults": normal,
        "abnormalResults": abnormal,
        "testsByType": by_type,
    })))
}

// Handler for a database round trip plus headline row counts
pub async fn system_health(pool: web::Data<DbPool>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    require_admin(&user)?;

    let (user_count, appointment_count, bill_count) = try_join!(
        db::run(&pool, |conn| {
            diesel::sql_query("SELECT 1").execute(conn)?;
            Ok(users::table.count().get_result::<i64>(conn)?)
        }),
        db::run(&pool, |conn| Ok(appointments::table.count().get_result::<i64>(conn)?)),
        db::run(&pool, |conn| Ok(bills::table.count().get_result::<i64>(conn)?)),
    )
    .map_err(|e| {
        tracing::error!(error = %e, "system health check failed");
        ApiError::Unavailable("System health check failed".to_string())
    })?;

    Ok(ok(json!({
        "databaseStatus": "connected",
        "dataIntegrity": {
            "users": user_count,
            "appointments": appointment_count,
            "bills": bill_count,
        },
        "serverTime": Utc::now(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_rate_has_two_decimals() {
        assert_eq!(completion_rate(0, 0), "0.00");
        assert_eq!(completion_rate(1, 3), "33.33");
        assert_eq!(completion_rate(2, 2), "100.00");
    }

    #[test]
    fn stats_fold_grouped_counts() {
        let stats = AppointmentStats::from_counts(&[
            (AppointmentStatus::Scheduled, 3),
            (AppointmentStatus::Completed, 4),
            (AppointmentStatus::Cancelled, 2),
            (AppointmentStatus::NoShow, 1),
        ]);
        assert_eq!(stats.total, 10);
        assert_eq!(stats.confirmed, 0);
        assert_eq!(stats.no_show, 1);
        assert_eq!(stats.completion_rate, "40.00");

        let empty = AppointmentStats::from_counts(&[]);
        assert_eq!(empty.total, 0);
        assert_eq!(empty.completion_rate, "0.00");
    }

    fn performance(rate: &str) -> DoctorPerformance {
        DoctorPerformance {
            doctor_id: Uuid::new_v4(),
            name: None,
            email: "doc@example.com".to_string(),
            specialty: None,
            total_appointments: 0,
            completed_appointments: 0,
            cancelled_appointments: 0,
            completion_rate: rate.to_string(),
            average_rating: BigDecimal::default(),
        }
    }

    #[test]
    fn doctors_rank_by_completion_rate() {
        let mut rows = vec![performance("9.50"), performance("100.00"), performance("0.00"), performance("50.00")];
        rank_by_completion(&mut rows);
        let rates: Vec<&str> = rows.iter().map(|r| r.completion_rate.as_str()).collect();
        assert_eq!(rates, ["100.00", "50.00", "9.50", "0.00"]);
    }

    #[test]
    fn date_bounds_cover_whole_days() {
        let start = parse_bound("2025-03-01", false).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-03-01T00:00:00+00:00");

        let end = parse_bound("2025-03-31", true).unwrap();
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
        assert!(end > parse_bound("2025-03-31T23:59:59Z", true).unwrap());

        assert!(parse_bound("2025-03-31T10:00:00+02:00", false).is_some());
        assert!(parse_bound("last month", false).is_none());
    }
}
