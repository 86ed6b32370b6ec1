//! Fixtures shared by the service tests.

use std::io::{Read, Write};
use std::net::TcpListener;

use rusqlite::params;

use crate::db::{now, with_conn, DbState};

pub fn insert_user(db: &DbState, id: &str, balance: i64) {
    insert_user_with_role(db, id, balance, "user");
}

pub fn insert_admin(db: &DbState, id: &str) {
    insert_user_with_role(db, id, 0, "admin");
}

fn insert_user_with_role(db: &DbState, id: &str, balance: i64, role: &str) {
    with_conn(db, |conn| {
        let ts = now();
        conn.execute(
            "INSERT INTO users (id, email, username, role, balance, banned, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
            params![id, format!("{}@example.com", id), id, role, balance, ts],
        )?;
        Ok(())
    })
    .unwrap();
}

pub fn set_banned(db: &DbState, id: &str) {
    with_conn(db, |conn| {
        conn.execute("UPDATE users SET banned = 1 WHERE id = ?1", params![id])?;
        Ok(())
    })
    .unwrap();
}

pub fn balance_of(db: &DbState, id: &str) -> i64 {
    with_conn(db, |conn| {
        Ok(conn.query_row("SELECT balance FROM users WHERE id = ?1", params![id], |row| row.get(0))?)
    })
    .unwrap()
}

pub fn insert_game(db: &DbState, id: &str) {
    with_conn(db, |conn| {
        let ts = now();
        conn.execute(
            "INSERT INTO games (id, name, slug, active, created_at, updated_at) VALUES (?1, ?1, ?1, 1, ?2, ?2)",
            params![id, ts],
        )?;
        Ok(())
    })
    .unwrap();
}

/// An upcoming tournament for game `g1` (created if missing), starting in the future.
pub fn insert_tournament(db: &DbState, id: &str, entry_fee: i64, max_teams: i64) {
    with_conn(db, |conn| {
        let ts = now();
        conn.execute(
            "INSERT OR IGNORE INTO games (id, name, slug, active, created_at, updated_at) VALUES ('g1', 'g1', 'g1', 1, ?1, ?1)",
            params![ts],
        )?;
        conn.execute(
            "INSERT INTO tournaments (id, title, game_id, entry_fee, prize_pool, max_teams, team_size, status, start_time, created_by, created_at, updated_at)
             VALUES (?1, ?1, 'g1', ?2, 10000, ?3, 1, 'upcoming', '2999-01-01T00:00:00+00:00', 'system', ?4, ?4)",
            params![id, entry_fee, max_teams, ts],
        )?;
        Ok(())
    })
    .unwrap();
}

/// Registers `captain_id` in the tournament without touching wallets or notifications.
pub fn insert_team(db: &DbState, tournament_id: &str, captain_id: &str) {
    with_conn(db, |conn| {
        conn.execute(
            "INSERT INTO teams (id, tournament_id, name, captain_id, players_json, created_at)
             VALUES (?1, ?2, ?3, ?4, '[]', ?5)",
            params![
                format!("{}_{}", tournament_id, captain_id),
                tournament_id,
                format!("Team {}", captain_id),
                captain_id,
                now()
            ],
        )?;
        Ok(())
    })
    .unwrap();
}

pub fn count_rows(db: &DbState, sql: &str) -> i64 {
    with_conn(db, |conn| Ok(conn.query_row(sql, [], |row| row.get(0))?)).unwrap()
}

/// Answer a single HTTP request on localhost with `body` as JSON. Returns the base URL.
pub fn serve_json_once(body: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).unwrap_or(0);
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&request[..end]).to_lowercase();
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= end + 4 + length {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = stream.write_all(response.as_bytes());
    });
    format!("http://{}", addr)
}
