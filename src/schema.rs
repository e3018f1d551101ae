use sea_query::Iden;

/// Metadata table - key-value store for database configuration
#[derive(Iden, Clone, Copy)]
pub enum Metadata {
    Table,
    Key,
    Value,
}

/// Admin accounts
#[derive(Iden, Clone, Copy)]
pub enum Users {
    Table,
    UserId,
    Role,
    Password,
}

/// Exam-taker accounts, one row per exam sitting
#[derive(Iden, Clone, Copy)]
pub enum Exuser {
    Table,
    UserId,
    Password,
    BatchCode,
    SubjectCode,
    CenterCode,
    Status,
    Login,
    LastPlayedPosition,
    #[iden = "last_played_position2"]
    LastPlayedPosition2,
    CountdownPosition,
    TrialPosition,
    Duration,
}

/// Audio assets per (batch_code, subject_code)
#[derive(Iden, Clone, Copy)]
pub enum Schedule {
    Table,
    BatchCode,
    SubjectCode,
    #[iden = "link_1"]
    Link1,
    #[iden = "link_2"]
    Link2,
    Countdown,
    Trialaudio,
    Testaudio,
    BatchTime,
    BatchDate,
    SubjectSpeed,
    SubjectLanguage,
}

/// Exam centers
#[derive(Iden, Clone, Copy)]
pub enum Center {
    Table,
    CenterCode,
    #[iden = "Center_name"]
    CenterName,
}

/// First-access timestamps, one column per page or stage
#[derive(Iden, Clone, Copy)]
pub enum Logs {
    Table,
    UserId,
    #[iden = "Logging"]
    Logging,
    Logout,
    Information,
    #[iden = "Instruction"]
    Instruction,
    Testaudio,
    TrialPassage,
    #[iden = "passage1"]
    Passage1,
    #[iden = "passage2"]
    Passage2,
    Countdown,
}
