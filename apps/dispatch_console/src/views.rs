//! Plain-text renderings of the dispatch screens.

use std::fmt::Write as _;

use dispatch_core::{view::TripRow, Directory, DispatchView};
use shared::domain::{Location, Order, Organization, Product, Trip, User, Vehicle};

fn checkbox(checked: bool) -> &'static str {
    if checked {
        "[x]"
    } else {
        "[ ]"
    }
}

fn location_label(directory: &Directory, id: Option<shared::domain::LocationId>) -> String {
    match id {
        Some(id) => directory
            .location_name(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{id}")),
        None => "-".to_string(),
    }
}

fn customer_label(directory: &Directory, order: &Order) -> String {
    match order.customer_id {
        Some(id) => directory
            .organization_name(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{id}")),
        None => "-".to_string(),
    }
}

fn trip_metrics(trip: &Trip) -> String {
    let distance = trip
        .total_distance
        .map(|km| format!("{km:.1} km"))
        .unwrap_or_else(|| "- km".to_string());
    let duration = trip
        .estimated_duration
        .map(|minutes| format!("{minutes:.0} min"))
        .unwrap_or_else(|| "- min".to_string());
    format!("{distance}, {duration}")
}

fn trip_orders(trip: &Trip) -> String {
    trip.order_ids()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_order_grid(view: &DispatchView, directory: &Directory) -> String {
    let mut out = String::new();
    if view.orders.is_empty() {
        out.push_str("No pending orders.\n");
        return out;
    }

    let _ = writeln!(
        out,
        "    {:>6}  {:<10}  {:<18}  {:<18}  {:<18}  {:>8}  {:<16}",
        "ORDER", "STATUS", "CUSTOMER", "PICKUP", "DELIVERY", "WEIGHT", "CREATED"
    );
    for row in &view.orders {
        let order = &row.order;
        let created = order
            .created_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{} {:>6}  {:<10}  {:<18}  {:<18}  {:<18}  {:>8.1}  {:<16}",
            checkbox(row.selected),
            order.id,
            order.status,
            customer_label(directory, order),
            location_label(directory, order.pickup_location_id),
            location_label(directory, order.delivery_location_id),
            order.weight,
            created,
        );
    }
    let _ = writeln!(
        out,
        "{} of {} selected{}",
        view.selected_order_count(),
        view.orders.len(),
        if view.can_propose {
            ""
        } else {
            " (propose unavailable)"
        }
    );
    if let Some(error) = &view.error {
        let _ = writeln!(out, "! {error}");
    }
    out
}

fn render_trip_row(out: &mut String, row: &TripRow) {
    let trip = &row.trip;
    let _ = writeln!(
        out,
        "{} Trip {}  vehicle {}  orders [{}]  {}",
        checkbox(row.checked),
        trip.id,
        trip.plate_number().unwrap_or("unassigned"),
        trip_orders(trip),
        trip_metrics(trip),
    );
}

pub fn render_proposal(view: &DispatchView) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} Select all ({} proposed trips)",
        checkbox(view.select_all_checked),
        view.proposal.len()
    );
    for row in &view.proposal {
        render_trip_row(&mut out, row);
    }
    if !view.can_confirm {
        out.push_str("Select at least one trip to confirm.\n");
    }
    if let Some(error) = &view.error {
        let _ = writeln!(out, "! {error}");
    }
    out
}

pub fn render_thank_you(view: &DispatchView) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Thank you! {} trip(s) confirmed.",
        view.confirmed.len()
    );
    for trip in &view.confirmed {
        let _ = writeln!(
            out,
            "  Trip {}  vehicle {}  orders [{}]  {}",
            trip.id,
            trip.plate_number().unwrap_or("unassigned"),
            trip_orders(trip),
            trip_metrics(trip),
        );
    }
    if let Some(error) = &view.error {
        let _ = writeln!(out, "! {error}");
    }
    out
}

pub fn render_trips(trips: &[Trip]) -> String {
    let mut out = String::new();
    for trip in trips {
        let _ = writeln!(
            out,
            "Trip {}  {}  vehicle {}  orders [{}]  {}",
            trip.id,
            trip.status.as_deref().unwrap_or("-"),
            trip.plate_number().unwrap_or("unassigned"),
            trip_orders(trip),
            trip_metrics(trip),
        );
    }
    out
}

pub fn render_vehicles(vehicles: &[Vehicle]) -> String {
    let mut out = String::new();
    for vehicle in vehicles {
        let capacity = vehicle
            .capacity
            .map(|capacity| format!("{capacity:.0}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:>6}  {:<14}  capacity {:>6}  {}",
            vehicle.id,
            vehicle.plate_number,
            capacity,
            if vehicle.active { "active" } else { "inactive" }
        );
    }
    out
}

pub fn render_products(products: &[Product]) -> String {
    let mut out = String::new();
    for product in products {
        let weight = product
            .unit_weight
            .map(|weight| format!("{weight:.1}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "{:>6}  {:<24}  {:>8}", product.id, product.name, weight);
    }
    out
}

pub fn render_locations(locations: &[Location]) -> String {
    let mut out = String::new();
    for location in locations {
        let coordinates = match (location.latitude, location.longitude) {
            (Some(lat), Some(lon)) => format!("{lat:.5}, {lon:.5}"),
            _ => "-".to_string(),
        };
        let _ = writeln!(
            out,
            "{:>6}  {:<24}  {:<32}  {}",
            location.id,
            location.name,
            location.address.as_deref().unwrap_or("-"),
            coordinates
        );
    }
    out
}

pub fn render_organizations(organizations: &[Organization]) -> String {
    let mut out = String::new();
    for organization in organizations {
        let _ = writeln!(out, "{:>6}  {}", organization.id, organization.name);
    }
    out
}

pub fn render_users(users: &[User]) -> String {
    let mut out = String::new();
    for user in users {
        let _ = writeln!(
            out,
            "{:>6}  {:<20}  {:<28}  {}",
            user.id,
            user.username,
            user.email.as_deref().unwrap_or("-"),
            user.role.as_deref().unwrap_or("-")
        );
    }
    out
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
