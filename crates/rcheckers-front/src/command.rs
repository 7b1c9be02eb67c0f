//! 対話コマンド
//!
//! stdin から 1 行 1 コマンドを受ける。指し手は "move 11-15" でも
//! "11-15" 単体でも良い。

use rcheckers_core::{Square, moves::parse_notation};

use crate::mode::Mode;
use crate::session::EngineId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 人間の着手
    Move { from: Square, to: Square },
    /// エンジン起動（既に思考中なら play-now 割り込み）
    Play,
    /// 今すぐ指させる
    PlayNow,
    /// 思考を中断して結果を捨てる
    Abort,
    Back,
    Forward,
    BackAll,
    ForwardAll,
    New,
    Fen(String),
    Comment(String),
    Mode(Mode),
    Engine(EngineId),
    /// エンジンへのテキストコマンド転送
    EngineCommand(String),
    /// 現局面のエントリをユーザーブックから消す
    BookDelete,
    Clocks,
    Show,
    Help,
    Quit,
}

/// 1 行をコマンドへ解析する
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head {
        "" => Err("empty command".to_string()),
        "move" => parse_move(rest),
        "play" => Ok(Command::Play),
        "playnow" => Ok(Command::PlayNow),
        "abort" => Ok(Command::Abort),
        "back" => Ok(Command::Back),
        "forward" => Ok(Command::Forward),
        "backall" => Ok(Command::BackAll),
        "forwardall" => Ok(Command::ForwardAll),
        "new" => Ok(Command::New),
        "fen" if !rest.is_empty() => Ok(Command::Fen(rest.to_string())),
        "fen" => Err("usage: fen <FEN>".to_string()),
        "comment" => Ok(Command::Comment(rest.to_string())),
        "mode" => Mode::parse(rest)
            .map(Command::Mode)
            .ok_or_else(|| format!("unknown mode: {rest}")),
        "engine" => match rest {
            "1" => Ok(Command::Engine(EngineId::Primary)),
            "2" => Ok(Command::Engine(EngineId::Secondary)),
            _ => Err("usage: engine 1|2".to_string()),
        },
        "ecmd" if !rest.is_empty() => Ok(Command::EngineCommand(rest.to_string())),
        "ecmd" => Err("usage: ecmd <command>".to_string()),
        "bookdel" => Ok(Command::BookDelete),
        "clocks" => Ok(Command::Clocks),
        "show" => Ok(Command::Show),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        // 裸の指し手表記も受け付ける
        _ => parse_move(line),
    }
}

fn parse_move(text: &str) -> Result<Command, String> {
    match parse_notation(text) {
        Some((from, to, _)) => Ok(Command::Move { from, to }),
        None => Err(format!("unknown command or move: {text}")),
    }
}

pub const HELP_TEXT: &str = "\
commands:
  move <a>-<b> | <a>x<b>   make a move (bare notation also works)
  play | playnow | abort   drive the engine
  back | forward | backall | forwardall
  new | fen <FEN> | comment <text>
  mode normal|2player|autoplay|match|enginegame|analyze|analyzepdn|observe|bookview|bookadd|testset
  engine 1|2 | ecmd <command> | bookdel
  clocks | show | help | quit";
