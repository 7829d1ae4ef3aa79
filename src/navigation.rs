//! The navigation bar shown on protected pages.

use maud::{Markup, html};

use crate::endpoints;

struct NavLink {
    label: &'static str,
    endpoint: &'static str,
}

const NAV_LINKS: [NavLink; 2] = [
    NavLink {
        label: "Home",
        endpoint: endpoints::ROOT,
    },
    NavLink {
        label: "Expenses",
        endpoint: endpoints::EXPENSES_VIEW,
    },
];

/// The top navigation bar, with the link for `active_endpoint` highlighted.
pub struct NavBar {
    active_endpoint: &'static str,
}

impl NavBar {
    pub fn new(active_endpoint: &'static str) -> Self {
        Self { active_endpoint }
    }

    pub fn into_html(self) -> Markup {
        html! {
            nav class="nav-bar"
            {
                ul
                {
                    @for link in &NAV_LINKS {
                        li
                        {
                            @if link.endpoint == self.active_endpoint {
                                a href=(link.endpoint) class="nav-link nav-link-active" aria-current="page" { (link.label) }
                            } @else {
                                a href=(link.endpoint) class="nav-link" { (link.label) }
                            }
                        }
                    }

                    li class="nav-spacer" {}

                    li
                    {
                        a href=(endpoints::LOG_OUT) class="nav-link" { "Log out" }
                    }
                }
            }
        }
    }
}
