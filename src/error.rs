use serde::Serialize;

/// The closed set of error codes the server ever sends over the wire, as
/// typed `ERROR` frames or as the body of a non-2xx HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadJson,
    BadSession,
    SessionExpired,
    RoomNotReady,
    RoomNotFound,
    RoomFull,
    NotInRoom,
    NotInGame,
    NotJoined,
    NotActive,
    DefenderCannotAttack,
    DefenderCannotPass,
    OnlyDefenderCanDefend,
    OnlyDefenderCanTake,
    OnlyDefenderCanBeat,
    OnlyDefenderCanTransfer,
    YouPassed,
    CardNotInHand,
    RoundLimit,
    OnlyMainAttackerStarts,
    BadCard,
    RankNotOnTable,
    DefenderMustRespond,
    BadAttackIndex,
    AlreadyDefended,
    DoesNotBeat,
    ModeNotPerevodnoy,
    TakeAlreadyDeclared,
    NothingToTransfer,
    CannotTransferAfterDefend,
    RankMustMatchAttack,
    NothingOnTable,
    NotFullyDefended,
    AttackersNotPassed,
    GameNotPlaying,
    GameFinished,
    UnknownMsg,
    PersistFailed,
}

/// Typed `ERROR` frame sent to a single originating socket. Never mutates
/// state and never carries private information about another player.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorFrame {
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorFrame {
    pub fn new(code: ErrorCode) -> ErrorFrame {
        ErrorFrame { code, detail: None }
    }

    pub fn with_detail(code: ErrorCode, detail: impl Into<String>) -> ErrorFrame {
        ErrorFrame { code, detail: Some(detail.into()) }
    }
}
