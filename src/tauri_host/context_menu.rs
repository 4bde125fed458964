use tauri::{
    menu::{CheckMenuItemBuilder, Menu, MenuBuilder, MenuEvent},
    AppHandle, Emitter, Manager, Runtime, WebviewWindow,
};

use crate::core::app_log;
use crate::models::events::{MENU_TOGGLE_DRAG, MENU_TOGGLE_PIN};

const SCOPE: &str = "tauri/context_menu";

pub const PIN_ITEM_ID: &str = "toggle_pin";
pub const DRAG_ITEM_ID: &str = "toggle_drag";

fn build_menu<R: Runtime, M: Manager<R>>(
    manager: &M,
    is_pinned: bool,
    is_draggable: Option<bool>,
) -> tauri::Result<Menu<R>> {
    let pin = CheckMenuItemBuilder::with_id(PIN_ITEM_ID, "Always on top")
        .checked(is_pinned)
        .build(manager)?;

    let mut builder = MenuBuilder::new(manager).item(&pin);
    // The drag entry only appears when the caller knows the flag.
    if let Some(draggable) = is_draggable {
        let drag = CheckMenuItemBuilder::with_id(DRAG_ITEM_ID, "Allow dragging")
            .checked(draggable)
            .build(manager)?;
        builder = builder.item(&drag);
    }
    builder.build()
}

pub fn popup<R: Runtime>(
    window: &WebviewWindow<R>,
    is_pinned: bool,
    is_draggable: Option<bool>,
) -> tauri::Result<()> {
    let menu = build_menu(window, is_pinned, is_draggable)?;
    window.popup_menu(&menu)
}

/// Re-emits the context menu's checkbox clicks as host events.
pub fn handle_menu_event<R: Runtime>(app: &AppHandle<R>, event: &MenuEvent) {
    let name = match event.id().as_ref() {
        PIN_ITEM_ID => MENU_TOGGLE_PIN,
        DRAG_ITEM_ID => MENU_TOGGLE_DRAG,
        _ => return,
    };
    if let Err(e) = app.emit(name, ()) {
        app_log::warn(
            SCOPE,
            "emit_failed",
            Some(serde_json::json!({ "event": name, "error": e.to_string() })),
        );
    }
}
