//! Shared maud templates: the base page layout, form controls and alerts.

use maud::{DOCTYPE, Markup, html};

use crate::endpoints;

// Form styles
pub const FORM_LABEL_STYLE: &str = "form-label";
pub const FORM_TEXT_INPUT_STYLE: &str = "form-input";
pub const BUTTON_PRIMARY_STYLE: &str = "btn-primary";

// Table styles
pub const TABLE_STYLE: &str = "data-table";

/// The base page layout shared by all views.
pub fn base(title: &str, content: &Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en"
        {
            head
            {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) " - Spendlog" }
                link href="/static/main.css" rel="stylesheet";
            }

            body
            {
                (content)
            }
        }
    }
}

/// A red alert box for validation and authentication errors.
pub fn alert_error(message: &str) -> Markup {
    html! {
        p class="alert alert-error" role="alert" { (message) }
    }
}

/// A labelled single-line text input.
///
/// `input_type` should be a valid HTML input type, e.g. "text" or "email".
pub fn text_input(input_type: &str, name: &str, label: &str, value: &str) -> Markup {
    html! {
        div
        {
            label for=(name) class=(FORM_LABEL_STYLE) { (label) }

            input
                type=(input_type)
                name=(name)
                id=(name)
                value=(value)
                class=(FORM_TEXT_INPUT_STYLE);
        }
    }
}

/// A labelled password input. The value is never echoed back.
pub fn password_input(name: &str, label: &str) -> Markup {
    html! {
        div
        {
            label for=(name) class=(FORM_LABEL_STYLE) { (label) }

            input
                type="password"
                name=(name)
                id=(name)
                placeholder="••••••••"
                class=(FORM_TEXT_INPUT_STYLE)
                required;
        }
    }
}

/// A centered container for the log-in and registration forms.
pub fn log_in_register(heading: &str, form: &Markup) -> Markup {
    html! {
        main class="auth-container"
        {
            h1 { (heading) }

            (form)
        }
    }
}

/// A full-page error view used for the 404 and 500 pages.
pub fn error_view(title: &str, code: &str, description: &str, fix: &str) -> Markup {
    base(
        title,
        &html! {
            main class="error-page"
            {
                h1 { (code) }
                h2 { (description) }
                p { (fix) }
                a href=(endpoints::ROOT) { "Go back home" }
            }
        },
    )
}
