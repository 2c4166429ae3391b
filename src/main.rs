use tokio::io::{AsyncBufReadExt, BufReader};

use rumenx_chess_client::board::{Square, SquareView};
use rumenx_chess_client::client::GameClient;
use rumenx_chess_client::config::ClientConfig;
use rumenx_chess_client::session::{SessionView, UserCommand};

/// One parsed line of terminal input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Command(UserCommand),
    Help,
    Quit,
    Nothing,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so they do not interleave with the board on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rumenx_chess_client=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(
        "rumenx-chess-client v{} connecting to {}",
        env!("CARGO_PKG_VERSION"),
        config.server_url
    );

    let client = GameClient::start(config);
    let mut views = client.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_help();
    render(&views.borrow_and_update().clone());

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                render(&view);
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse_input(&line) {
                    Ok(Input::Command(command)) => {
                        if !client.send(command) {
                            break;
                        }
                    }
                    Ok(Input::Help) => print_help(),
                    Ok(Input::Quit) => break,
                    Ok(Input::Nothing) => {}
                    Err(msg) => println!("{msg}"),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "failed to read stdin");
                    break;
                }
            }
        }
    }

    client.shutdown().await;
}

fn parse_input(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Input::Nothing);
    };
    let arg = words.next();

    let command = match (verb.to_ascii_lowercase().as_str(), arg) {
        ("register", Some(name)) => UserCommand::RegisterUsername(name.to_string()),
        ("create", _) => UserCommand::CreateRoom,
        ("join", Some(code)) => UserCommand::JoinRoom(code.to_string()),
        ("click", Some(square)) => UserCommand::ClickSquare(parse_square(square)?),
        ("reset", _) => UserCommand::Reset,
        ("help", _) => return Ok(Input::Help),
        ("quit" | "exit", _) => return Ok(Input::Quit),
        ("register" | "join" | "click", None) => {
            return Err(format!("{verb}: missing argument"));
        }
        _ => return Err(format!("unknown command: {verb} (try `help`)")),
    };
    Ok(Input::Command(command))
}

/// Accepts algebraic names (`e2`) or board indices (`0` = a8 … `63` = h1).
fn parse_square(s: &str) -> Result<Square, String> {
    if let Ok(sq) = s.parse::<Square>() {
        return Ok(sq);
    }
    s.parse::<u8>()
        .ok()
        .and_then(Square::new)
        .ok_or_else(|| format!("not a square: {s}"))
}

fn print_help() {
    println!("commands: register <name> | create | join <code> | click <square> | reset | quit");
}

fn render(view: &SessionView) {
    let mut out = String::new();
    out.push_str(&format!("\n[{}]", view.state));
    if !view.session.username.is_empty() {
        out.push_str(&format!(" {}", view.session.username));
    }
    if let Some(color) = view.session.assigned_color {
        out.push_str(&format!(" ({color})"));
    }
    if let Some(room) = &view.session.room {
        out.push_str(&format!(
            " room {} {} vs {}",
            room.code,
            or_dash(&room.white),
            or_dash(&room.black)
        ));
    }
    out.push_str(&format!(" | {}\n", view.board.phase()));
    if let Some(banner) = &view.banner {
        out.push_str(&format!("! {}\n", banner.message));
    }

    if view.selected.is_none() {
        out.push_str(&view.board.board_string());
    } else {
        out.push_str(&marked_board(view));
    }
    print!("{out}");
}

/// Board diagram with the selection in brackets and destinations starred.
fn marked_board(view: &SessionView) -> String {
    let mut s = String::new();
    let squares: Vec<SquareView> = view.board.squares().collect();
    for row in squares.chunks(8) {
        s.push_str(&format!("{} ", row[0].square.rank()));
        for cell in row {
            let c = cell.occupant.map_or('.', |p| p.to_char());
            if view.selected == Some(cell.square) {
                s.push_str(&format!("[{c}]"));
            } else if view.destinations.contains(&cell.square) {
                s.push_str(&format!("*{c} "));
            } else {
                s.push_str(&format!(" {c} "));
            }
        }
        s.push('\n');
    }
    s.push_str("   a  b  c  d  e  f  g  h\n");
    s
}

fn or_dash(name: &str) -> &str {
    if name.is_empty() { "-" } else { name }
}
