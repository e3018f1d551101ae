use sea_query::{Alias, Expr, Query, SqliteQueryBuilder};

use crate::schema::Schedule;

/// SELECT <link column> AS link FROM schedule WHERE batch_code = ? AND subject_code = ? LIMIT 1
pub fn select_link(batch_code: &str, subject_code: &str, link_column: Schedule) -> String {
    Query::select()
        .expr_as(
            Expr::col(link_column).cast_as(Alias::new("TEXT")),
            Alias::new("link"),
        )
        .from(Schedule::Table)
        .and_where(Expr::col(Schedule::BatchCode).eq(batch_code))
        .and_where(Expr::col(Schedule::SubjectCode).eq(subject_code))
        .limit(1)
        .to_string(SqliteQueryBuilder)
}

/// INSERT INTO schedule (batch_code, subject_code, link_1, link_2, countdown, trialaudio, testaudio)
/// VALUES (?, ?, ?, ?, ?, ?, ?)
pub fn insert_links(
    batch_code: &str,
    subject_code: &str,
    link_1: &str,
    link_2: &str,
    countdown: &str,
    trialaudio: &str,
    testaudio: &str,
) -> String {
    Query::insert()
        .into_table(Schedule::Table)
        .columns([
            Schedule::BatchCode,
            Schedule::SubjectCode,
            Schedule::Link1,
            Schedule::Link2,
            Schedule::Countdown,
            Schedule::Trialaudio,
            Schedule::Testaudio,
        ])
        .values_panic([
            batch_code.into(),
            subject_code.into(),
            link_1.into(),
            link_2.into(),
            countdown.into(),
            trialaudio.into(),
            testaudio.into(),
        ])
        .to_string(SqliteQueryBuilder)
}
