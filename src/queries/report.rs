use sea_query::{Alias, Expr, Order, Query, SqliteQueryBuilder};

use crate::schema::{Center, Exuser, Logs, Schedule};
use crate::stage::Stage;

/// Candidate overview for the admin dashboard:
///
/// SELECT exuser.*, schedule.batch_date, schedule.batch_time, center.Center_name, logs.*
/// FROM exuser
/// LEFT JOIN schedule ON (batch_code, subject_code)
/// LEFT JOIN center ON center_code
/// LEFT JOIN logs ON user_id
/// ORDER BY exuser.user_id
pub fn select_candidate_report() -> String {
    let mut query = Query::select();
    query
        .expr_as(
            Expr::col((Exuser::Table, Exuser::UserId)).cast_as(Alias::new("TEXT")),
            Alias::new("user_id"),
        )
        .column((Exuser::Table, Exuser::BatchCode))
        .column((Exuser::Table, Exuser::SubjectCode))
        .column((Exuser::Table, Exuser::CenterCode))
        .column((Center::Table, Center::CenterName))
        .column((Schedule::Table, Schedule::BatchDate))
        .column((Schedule::Table, Schedule::BatchTime))
        .column((Schedule::Table, Schedule::SubjectLanguage))
        .column((Schedule::Table, Schedule::SubjectSpeed))
        .expr_as(
            Expr::col((Exuser::Table, Exuser::Status)).cast_as(Alias::new("TEXT")),
            Alias::new("status"),
        )
        .expr_as(
            Expr::col((Exuser::Table, Exuser::Login)).cast_as(Alias::new("TEXT")),
            Alias::new("login"),
        )
        .expr_as(
            Expr::col((Exuser::Table, Exuser::Duration)).cast_as(Alias::new("TEXT")),
            Alias::new("duration"),
        );
    for stage in Stage::ALL {
        query.expr_as(
            Expr::col((Exuser::Table, stage.position_column())).cast_as(Alias::new("TEXT")),
            Alias::new(format!("{}_position", stage.as_str())),
        );
    }
    query
        .column((Logs::Table, Logs::Logging))
        .column((Logs::Table, Logs::Logout))
        .column((Logs::Table, Logs::Information))
        .column((Logs::Table, Logs::Instruction))
        .column((Logs::Table, Logs::Testaudio))
        .column((Logs::Table, Logs::Countdown))
        .column((Logs::Table, Logs::TrialPassage))
        .column((Logs::Table, Logs::Passage1))
        .column((Logs::Table, Logs::Passage2))
        .from(Exuser::Table)
        .left_join(
            Schedule::Table,
            Expr::col((Schedule::Table, Schedule::BatchCode))
                .equals((Exuser::Table, Exuser::BatchCode))
                .and(
                    Expr::col((Schedule::Table, Schedule::SubjectCode))
                        .equals((Exuser::Table, Exuser::SubjectCode)),
                ),
        )
        .left_join(
            Center::Table,
            Expr::col((Center::Table, Center::CenterCode))
                .equals((Exuser::Table, Exuser::CenterCode)),
        )
        .left_join(
            Logs::Table,
            Expr::col((Logs::Table, Logs::UserId)).equals((Exuser::Table, Exuser::UserId)),
        )
        .order_by((Exuser::Table, Exuser::UserId), Order::Asc)
        .to_string(SqliteQueryBuilder)
}
