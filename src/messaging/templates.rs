//! Outbound WhatsApp message bodies. Carriers read these on a phone screen,
//! so they stay short, bold the key facts, and always repeat the trip number.

use crate::models::carrier::Carrier;
use crate::models::trip::{CheckpointStage, Trip};

fn stage_menu() -> &'static str {
    "1️⃣ - Llegué a cargar\n\
     2️⃣ - Cargado, saliendo\n\
     3️⃣ - En camino\n\
     4️⃣ - Llegué a destino\n\
     5️⃣ - Descargado"
}

pub fn trip_offer(carrier: &Carrier, trip: &Trip) -> String {
    let price = trip.agreed_price.unwrap_or(0.0);

    format!(
        "🚚 *Nueva oferta de viaje #{}*\n\n\
         📍 *Origen:* {}, {}\n\
         📍 *Destino:* {}, {}\n\
         📅 *Fecha:* {}\n\
         💰 *Pago:* ${price:.0}\n\
         📦 *Carga:* {} - {} tn\n\n\
         Hola {},\n\n\
         Tenemos un viaje disponible para vos.\n\n\
         *Respondé con:*\n\
         1️⃣ - Confirmo\n\
         2️⃣ - No tengo disponibilidad",
        trip.number,
        trip.origin.city,
        trip.origin.province,
        trip.destination.city,
        trip.destination.province,
        trip.scheduled_date.format("%d/%m/%Y"),
        trip.cargo_type,
        trip.weight_tons,
        carrier.driver_name,
    )
}

pub fn trip_details_with_tracking(carrier: &Carrier, trip: &Trip, tracking_url: &str) -> String {
    let notes = trip
        .notes
        .as_deref()
        .map(|n| format!("📝 *Notas:* {n}\n\n"))
        .unwrap_or_default();

    format!(
        "✅ *Viaje confirmado #{}*\n\n\
         Hola {},\n\n\
         Tu viaje fue confirmado. Estos son los detalles:\n\n\
         📍 *Origen:* {}, {}\n\
         📍 *Destino:* {}, {}\n\
         📅 *Fecha:* {}\n\
         📦 *Carga:* {} - {} tn\n\n\
         {notes}🚚 *TRACKING EN TIEMPO REAL*\n\n\
         Abrí este link para activar el tracking GPS:\n{tracking_url}\n\n\
         *Recordá reportar los siguientes estados:*\n{}",
        trip.number,
        carrier.business_name,
        trip.origin.city,
        trip.origin.province,
        trip.destination.city,
        trip.destination.province,
        trip.scheduled_date.format("%d/%m/%Y"),
        trip.cargo_type,
        trip.weight_tons,
        stage_menu(),
    )
}

pub fn check_in_menu(carrier: &Carrier, trip: &Trip) -> String {
    let current = trip
        .sub_status
        .map(|s| format!("\n*Estado actual:* {}\n", s.label()))
        .unwrap_or_else(|| "\n".to_string());

    format!(
        "📍 *Viaje #{}*\n\n\
         Hola {},\n{current}\n\
         *Reportá el estado del viaje:*\n\n{}",
        trip.number,
        carrier.driver_name,
        stage_menu(),
    )
}

pub fn check_in_recorded(trip: &Trip, stage: CheckpointStage) -> String {
    format!(
        "✅ *Check-in registrado*\n\n{} - Viaje #{}",
        stage.label(),
        trip.number
    )
}

pub fn location_received(trip: &Trip) -> String {
    format!(
        "✅ *Ubicación recibida*\n\nViaje #{}\n\nGracias por mantener actualizado el seguimiento.",
        trip.number
    )
}

pub fn trip_finished() -> String {
    "🎉 *Viaje finalizado*\n\nGracias por completar el viaje. ¡Buen trabajo!".to_string()
}

pub fn rejection_ack() -> String {
    "✅ Entendido. Gracias por tu respuesta.".to_string()
}

pub fn no_active_offer() -> String {
    "❌ No hay una oferta de viaje activa para confirmar.".to_string()
}

pub fn trip_unavailable() -> String {
    "❌ El viaje ya no está disponible.".to_string()
}

pub fn trip_already_assigned(trip: &Trip) -> String {
    format!("❌ El viaje #{} ya fue asignado a otro transportista.", trip.number)
}

pub fn no_active_trip() -> String {
    "❌ No hay un viaje activo para reportar.".to_string()
}

pub fn trip_update(trip: &Trip, carrier: &Carrier, message: &str) -> String {
    format!(
        "🔄 *Actualización - Viaje #{}*\n\nHola {},\n\n{message}",
        trip.number, carrier.business_name
    )
}
