use std::collections::BTreeSet;

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    Addon, Booking, BookingStatus, HistoryEntry, Location, PriceUnit, RefundRecord,
};

pub fn format_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid stored timestamp: {raw}"))
}

// ── Locations ──

pub fn create_location(conn: &Connection, location: &Location) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO locations (id, host_id, name, base_price_per_hour, incremental_rate_per_guest, instant_book)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            location.id,
            location.host_id,
            location.name,
            location.base_price_per_hour,
            location.incremental_rate_per_guest,
            location.instant_book as i32,
        ],
    )?;
    for addon in &location.addons {
        create_addon(conn, addon)?;
    }
    Ok(())
}

pub fn get_location(conn: &Connection, id: &str) -> anyhow::Result<Option<Location>> {
    let result = conn.query_row(
        "SELECT id, host_id, name, base_price_per_hour, incremental_rate_per_guest, instant_book
         FROM locations WHERE id = ?1",
        params![id],
        parse_location_row,
    );

    match result {
        Ok(mut location) => {
            location.addons = get_addons_for_location(conn, &location.id)?;
            Ok(Some(location))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_locations(
    conn: &Connection,
    host_id: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Location>> {
    let mut stmt = conn.prepare(
        "SELECT id, host_id, name, base_price_per_hour, incremental_rate_per_guest, instant_book
         FROM locations WHERE (?1 IS NULL OR host_id = ?1) ORDER BY created_at ASC, id ASC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![host_id, limit], parse_location_row)?;

    let mut locations = vec![];
    for row in rows {
        let mut location = row?;
        location.addons = get_addons_for_location(conn, &location.id)?;
        locations.push(location);
    }
    Ok(locations)
}

fn parse_location_row(row: &rusqlite::Row) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(0)?,
        host_id: row.get(1)?,
        name: row.get(2)?,
        base_price_per_hour: row.get(3)?,
        incremental_rate_per_guest: row.get(4)?,
        instant_book: row.get::<_, i32>(5)? != 0,
        addons: vec![],
    })
}

pub fn create_addon(conn: &Connection, addon: &Addon) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO addons (id, location_id, name, price, price_unit) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            addon.id,
            addon.location_id,
            addon.name,
            addon.price,
            addon.price_unit.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get_addons_for_location(conn: &Connection, location_id: &str) -> anyhow::Result<Vec<Addon>> {
    let mut stmt = conn.prepare(
        "SELECT id, location_id, name, price, price_unit FROM addons WHERE location_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![location_id], |row| {
        let unit: String = row.get(4)?;
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            unit,
        ))
    })?;

    let mut addons = vec![];
    for row in rows {
        let (id, location_id, name, price, unit) = row?;
        addons.push(Addon {
            id,
            location_id,
            name,
            price,
            price_unit: unit.parse::<PriceUnit>().map_err(anyhow::Error::msg)?,
        });
    }
    Ok(addons)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "b.id, b.location_id, b.client_id, b.start_date, b.end_date, b.guest_count, \
     b.status, b.total_price, b.additional_price, b.selected_addons, b.version, b.created_at, b.updated_at";

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, location_id, client_id, start_date, end_date, guest_count, status,
                               total_price, additional_price, selected_addons, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            booking.id,
            booking.location_id,
            booking.client_id,
            format_ts(&booking.start_date),
            format_ts(&booking.end_date),
            booking.guest_count,
            booking.status.as_str(),
            booking.total_price,
            booking.additional_price,
            serde_json::to_string(&booking.selected_addons)?,
            booking.version,
            format_ts(&booking.created_at),
            format_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

/// Writes the mutable columns only if the stored version still equals
/// `booking.version`. Returns false when another writer got there first.
pub fn update_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET start_date = ?1, end_date = ?2, guest_count = ?3, status = ?4,
                             total_price = ?5, additional_price = ?6, selected_addons = ?7,
                             updated_at = ?8, version = version + 1
         WHERE id = ?9 AND version = ?10",
        params![
            format_ts(&booking.start_date),
            format_ts(&booking.end_date),
            booking.guest_count,
            booking.status.as_str(),
            booking.total_price,
            booking.additional_price,
            serde_json::to_string(&booking.selected_addons)?,
            format_ts(&booking.updated_at),
            booking.id,
            booking.version,
        ],
    )?;
    Ok(count > 0)
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => {
            let mut booking = booking?;
            booking.edit_history = get_history(conn, &booking.id)?;
            Ok(Some(booking))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn booking_exists(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[derive(Debug, Default)]
pub struct BookingFilter<'a> {
    pub status: Option<BookingStatus>,
    pub location_id: Option<&'a str>,
    pub client_id: Option<&'a str>,
    /// Restricts to bookings at locations owned by this host.
    pub host_id: Option<&'a str>,
    pub limit: i64,
}

pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> anyhow::Result<Vec<Booking>> {
    let mut sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b JOIN locations l ON l.id = b.location_id WHERE 1 = 1"
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND b.status = ?{}", params_vec.len()));
    }
    if let Some(location_id) = filter.location_id {
        params_vec.push(Box::new(location_id.to_string()));
        sql.push_str(&format!(" AND b.location_id = ?{}", params_vec.len()));
    }
    if let Some(client_id) = filter.client_id {
        params_vec.push(Box::new(client_id.to_string()));
        sql.push_str(&format!(" AND b.client_id = ?{}", params_vec.len()));
    }
    if let Some(host_id) = filter.host_id {
        params_vec.push(Box::new(host_id.to_string()));
        sql.push_str(&format!(" AND l.host_id = ?{}", params_vec.len()));
    }
    params_vec.push(Box::new(filter.limit));
    sql.push_str(&format!(" ORDER BY b.start_date DESC LIMIT ?{}", params_vec.len()));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        let mut booking = row??;
        booking.edit_history = get_history(conn, &booking.id)?;
        bookings.push(booking);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let status_str: String = row.get(6)?;
    let addons_json: String = row.get(9)?;
    let selected_addons: BTreeSet<String> =
        serde_json::from_str(&addons_json).context("invalid stored add-on list")?;

    Ok(Booking {
        id: row.get(0)?,
        location_id: row.get(1)?,
        client_id: row.get(2)?,
        start_date: parse_ts(&row.get::<_, String>(3)?)?,
        end_date: parse_ts(&row.get::<_, String>(4)?)?,
        guest_count: row.get(5)?,
        status: status_str
            .parse::<BookingStatus>()
            .map_err(anyhow::Error::msg)?,
        total_price: row.get(7)?,
        additional_price: row.get(8)?,
        selected_addons,
        version: row.get(10)?,
        created_at: parse_ts(&row.get::<_, String>(11)?)?,
        updated_at: parse_ts(&row.get::<_, String>(12)?)?,
        edit_history: vec![],
    })
}

// ── Booking History ──

pub fn insert_history_entry(conn: &Connection, entry: &HistoryEntry) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO booking_history (booking_id, seq, timestamp, actor_id, change_summary, price_delta, notified_client)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.booking_id,
            entry.seq,
            format_ts(&entry.timestamp),
            entry.actor_id,
            entry.change_summary,
            entry.price_delta,
            entry.notified_client as i32,
        ],
    )?;
    Ok(())
}

pub fn max_history_seq(conn: &Connection, booking_id: &str) -> anyhow::Result<i64> {
    let seq: i64 = conn.query_row(
        "SELECT COALESCE(MAX(seq), 0) FROM booking_history WHERE booking_id = ?1",
        params![booking_id],
        |row| row.get(0),
    )?;
    Ok(seq)
}

pub fn get_history(conn: &Connection, booking_id: &str) -> anyhow::Result<Vec<HistoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT seq, booking_id, timestamp, actor_id, change_summary, price_delta, notified_client
         FROM booking_history WHERE booking_id = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i64>(5)?,
            row.get::<_, i32>(6)? != 0,
        ))
    })?;

    let mut entries = vec![];
    for row in rows {
        let (seq, booking_id, timestamp, actor_id, change_summary, price_delta, notified_client) =
            row?;
        entries.push(HistoryEntry {
            seq,
            booking_id,
            timestamp: parse_ts(&timestamp)?,
            actor_id,
            change_summary,
            price_delta,
            notified_client,
        });
    }
    Ok(entries)
}

// ── Refunds ──

pub fn insert_refund(conn: &Connection, refund: &RefundRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO refunds (id, booking_id, amount, reason, processed_at, processed_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            refund.id,
            refund.booking_id,
            refund.amount,
            refund.reason,
            format_ts(&refund.processed_at),
            refund.processed_by,
        ],
    )?;
    Ok(())
}

pub fn get_refunds_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Vec<RefundRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, amount, reason, processed_at, processed_by
         FROM refunds WHERE booking_id = ?1 ORDER BY processed_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut refunds = vec![];
    for row in rows {
        let (id, booking_id, amount, reason, processed_at, processed_by) = row?;
        refunds.push(RefundRecord {
            id,
            booking_id,
            amount,
            reason,
            processed_at: parse_ts(&processed_at)?,
            processed_by,
        });
    }
    Ok(refunds)
}
