use axum::http::StatusCode;
use maud::{DOCTYPE, Markup, PreEscaped, html};

use crate::{
    catalog::MovieRelations,
    entities::{actor, genre, movie, rating_star},
    models::Paged,
    ratings::RatingSummary,
    reviews::ReviewNode,
};

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

/// Posts the star form in the background; the endpoint answers with a bare status code.
const RATING_SCRIPT: &str = r#"
document.querySelectorAll('form[name=rating]').forEach((form) => {
  form.addEventListener('change', async () => {
    const res = await fetch(form.action, { method: 'POST', body: new URLSearchParams(new FormData(form)) });
    form.querySelector('[data-status]').textContent = res.status === 201 ? 'Rating saved' : 'Could not save rating';
  });
});
"#;

/// Genres and release years offered by the filter sidebar.
pub struct Sidebar {
    pub genres: Vec<genre::Model>,
    pub years: Vec<i16>,
}

pub fn movie_list_page(
    site: &str,
    heading: &str,
    movies: &Paged<movie::Model>,
    sidebar: &Sidebar,
    query: &str,
) -> String {
    page(
        site,
        heading,
        html! {
            (header(site))
            div class="max-w-6xl mx-auto px-6 py-10 grid gap-8 md:grid-cols-4" {
                main class="md:col-span-3" {
                    h1 class="text-3xl font-bold text-gray-900" { (heading) }
                    @if movies.items.is_empty() {
                        div class="mt-8 bg-white shadow rounded-lg p-8" {
                            p class="text-gray-600" { "No movies found." }
                        }
                    } @else {
                        div class="mt-8 grid gap-6 sm:grid-cols-2" {
                            @for m in &movies.items {
                                (movie_card(m))
                            }
                        }
                    }
                    (pagination(movies, query))
                }
                aside { (filter_sidebar(sidebar)) }
            }
        },
    )
}

pub fn movie_detail_page(
    site: &str,
    movie: &movie::Model,
    relations: &MovieRelations,
    reviews: &[ReviewNode],
    stars: &[rating_star::Model],
    summary: &RatingSummary,
    sidebar: &Sidebar,
) -> String {
    let genres: Vec<&str> = relations.genres.iter().map(|g| g.name.as_str()).collect();
    page(
        site,
        &movie.title,
        html! {
            (header(site))
            div class="max-w-6xl mx-auto px-6 py-10 grid gap-8 md:grid-cols-4" {
                main class="md:col-span-3 space-y-8" {
                    div class="bg-white shadow rounded-lg p-8 flex gap-8" {
                        img class="w-48 rounded" src=(media(&movie.poster)) alt=(movie.title);
                        div {
                            h1 class="text-3xl font-bold text-gray-900" {
                                (movie.title)
                                span class="ml-2 font-normal text-gray-500" { "(" (movie.year) ")" }
                            }
                            p class="mt-1 italic text-gray-600" { (movie.tagline) }
                            dl class="mt-4 grid grid-cols-2 gap-x-6 gap-y-1 text-sm text-gray-700" {
                                dt class="font-medium" { "Country" } dd { (movie.country) }
                                dt class="font-medium" { "Category" }
                                dd { @if let Some(c) = &relations.category { (c.name) } }
                                dt class="font-medium" { "Genres" }
                                dd { (genres.join(", ")) }
                                dt class="font-medium" { "World premiere" } dd { (movie.world_premiere) }
                                dt class="font-medium" { "Budget" } dd { "$" (movie.budget) }
                                dt class="font-medium" { "Fees in USA" } dd { "$" (movie.fees_in_usa) }
                                dt class="font-medium" { "Fees in world" } dd { "$" (movie.fees_in_world) }
                            }
                            (people("Directors", &relations.directors))
                            (people("Actors", &relations.actors))
                            (rating_form(movie.id, stars, summary))
                        }
                    }

                    div class="bg-white shadow rounded-lg p-8" {
                        p class="text-gray-700 whitespace-pre-line" { (movie.description) }
                        @if !relations.shots.is_empty() {
                            div class="mt-6 grid grid-cols-3 gap-4" {
                                @for shot in &relations.shots {
                                    figure {
                                        img class="rounded" src=(media(&shot.image)) alt=(shot.title);
                                        figcaption class="mt-1 text-xs text-gray-500" { (shot.title) }
                                    }
                                }
                            }
                        }
                    }

                    div class="bg-white shadow rounded-lg p-8" {
                        h2 class="text-xl font-semibold text-gray-900" { "Reviews" }
                        (review_thread(reviews))
                        (review_form(movie.id))
                    }
                }
                aside { (filter_sidebar(sidebar)) }
            }
        },
    )
}

pub fn actor_page(site: &str, actor: &actor::Model, movies: &[movie::Model]) -> String {
    page(
        site,
        &actor.name,
        html! {
            (header(site))
            div class="max-w-4xl mx-auto px-6 py-10" {
                div class="bg-white shadow rounded-lg p-8 flex gap-8" {
                    img class="w-40 rounded" src=(media(&actor.image)) alt=(actor.name);
                    div {
                        h1 class="text-3xl font-bold text-gray-900" { (actor.name) }
                        p class="mt-1 text-gray-500" { "Age: " (actor.age) }
                        p class="mt-4 text-gray-700 whitespace-pre-line" { (actor.description) }
                    }
                }
                @if !movies.is_empty() {
                    h2 class="mt-10 text-xl font-semibold text-gray-900" { "Filmography" }
                    ul class="mt-4 space-y-1" {
                        @for m in movies {
                            li { a class="text-blue-600 hover:text-blue-800" href=(movie_href(m)) { (m.title) " (" (m.year) ")" } }
                        }
                    }
                }
            }
        },
    )
}

pub fn error_page(status: StatusCode, message: String) -> String {
    page(
        "Error",
        status.canonical_reason().unwrap_or("Error"),
        html! {
            div class="min-h-screen bg-gray-50 flex items-center justify-center" {
                div class="max-w-xl w-full px-6" {
                    div class="bg-white shadow rounded-lg p-8" {
                        h1 class="text-2xl font-bold text-gray-900" { (status.as_u16()) " " (status.canonical_reason().unwrap_or("Error")) }
                        p class="mt-4 text-gray-700" { (message) }
                        a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/" { "Back" }
                    }
                }
            }
        },
    )
}

fn page(site: &str, title: &str, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " · " (site) }
                script src=(TAILWIND_CDN) {}
            }
            body class="bg-gray-50" {
                (body)
                script { (PreEscaped(RATING_SCRIPT)) }
            }
        }
    }
    .into_string()
}

fn header(site: &str) -> Markup {
    html! {
        header class="bg-white shadow" {
            div class="max-w-6xl mx-auto px-6 py-4 flex items-center justify-between gap-6" {
                a class="text-2xl font-bold text-gray-900" href="/" { (site) }
                form method="get" action="/search" class="flex gap-2" {
                    input class="rounded-md border border-gray-300 px-3 py-1" type="search" name="q" placeholder="Search titles";
                    button class="rounded-md bg-blue-600 px-3 py-1 text-white hover:bg-blue-700" type="submit" { "Search" }
                }
            }
        }
    }
}

fn movie_card(m: &movie::Model) -> Markup {
    html! {
        a class="block bg-white shadow rounded-lg p-4 hover:shadow-md" href=(movie_href(m)) {
            img class="w-full rounded" src=(media(&m.poster)) alt=(m.title);
            h2 class="mt-3 text-lg font-semibold text-gray-900" { (m.title) }
            p class="text-sm text-gray-500" { (m.tagline) }
        }
    }
}

fn people(label: &str, people: &[actor::Model]) -> Markup {
    html! {
        @if !people.is_empty() {
            p class="mt-3 text-sm text-gray-700" {
                span class="font-medium" { (label) ": " }
                @for (i, person) in people.iter().enumerate() {
                    @if i > 0 { ", " }
                    a class="text-blue-600 hover:text-blue-800" href=(format!("/actor/{}", urlencoding::encode(&person.name))) { (person.name) }
                }
            }
        }
    }
}

fn rating_form(movie_id: i32, stars: &[rating_star::Model], summary: &RatingSummary) -> Markup {
    html! {
        form name="rating" class="mt-6" method="post" action="/add-rating" {
            input type="hidden" name="movie" value=(movie_id);
            p class="text-sm text-gray-700" {
                "Average: "
                @match summary.average_stars {
                    Some(avg) => { (format!("{avg:.1}")) " / 5" }
                    None => { "not rated yet" }
                }
                @if summary.client_has_rated { " · you rated this movie" }
            }
            div class="mt-2 flex gap-3" {
                @for star in stars {
                    label class="text-sm" {
                        input type="radio" name="star" value=(star.id);
                        " " (star.value)
                    }
                }
            }
            p class="mt-1 text-xs text-gray-500" data-status {}
        }
    }
}

/// Reviews in display order with their nesting depth, walked without recursion.
fn flatten(reviews: &[ReviewNode]) -> Vec<(usize, &ReviewNode)> {
    let mut out = Vec::new();
    let mut stack: Vec<(usize, &ReviewNode)> = reviews.iter().rev().map(|r| (0, r)).collect();
    while let Some((depth, node)) = stack.pop() {
        out.push((depth, node));
        stack.extend(node.children.iter().rev().map(|c| (depth + 1, c)));
    }
    out
}

fn review_thread(reviews: &[ReviewNode]) -> Markup {
    html! {
        @if reviews.is_empty() {
            p class="mt-4 text-gray-500" { "No reviews yet." }
        } @else {
            div class="mt-4 space-y-4" {
                @for (depth, review) in flatten(reviews) {
                    div class="border-l-4 border-blue-200 pl-4" style=(format!("margin-left: {}rem", depth.min(8) * 2)) id=(format!("review-{}", review.id)) {
                        p class="font-medium text-gray-900" { (review.name) }
                        p class="text-gray-700 whitespace-pre-line" { (review.text) }
                        button class="mt-1 text-xs text-blue-600" type="button"
                            onclick=(format!("document.getElementById('review-parent').value = {}", review.id)) { "Reply" }
                    }
                }
            }
        }
    }
}

fn review_form(movie_id: i32) -> Markup {
    html! {
        form class="mt-8 space-y-4" method="post" action=(format!("/review/{movie_id}")) {
            input type="hidden" name="parent" id="review-parent" value="";
            input class="w-full rounded-md border border-gray-300 px-3 py-2" name="name" placeholder="Name" required;
            input class="w-full rounded-md border border-gray-300 px-3 py-2" type="email" name="email" placeholder="Email" required;
            textarea class="w-full rounded-md border border-gray-300 px-3 py-2" name="text" rows="4" maxlength="5000" required {}
            button class="rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Send" }
        }
    }
}

fn filter_sidebar(sidebar: &Sidebar) -> Markup {
    html! {
        form class="bg-white shadow rounded-lg p-6 space-y-6" method="get" action="/filter" {
            div {
                h3 class="text-sm font-semibold text-gray-700" { "Genres" }
                @for g in &sidebar.genres {
                    label class="mt-1 block text-sm text-gray-700" {
                        input type="checkbox" name="genre" value=(g.id);
                        " " (g.name)
                    }
                }
            }
            div {
                h3 class="text-sm font-semibold text-gray-700" { "Years" }
                @for year in &sidebar.years {
                    label class="mt-1 block text-sm text-gray-700" {
                        input type="checkbox" name="year" value=(year);
                        " " (year)
                    }
                }
            }
            button class="w-full rounded-md bg-blue-600 px-4 py-2 text-white hover:bg-blue-700" type="submit" { "Filter" }
        }
    }
}

fn pagination<T>(movies: &Paged<T>, query: &str) -> Markup {
    html! {
        @if movies.num_pages > 1 {
            nav class="mt-8 flex items-center gap-4 text-sm" {
                @if movies.has_previous() {
                    a class="text-blue-600 hover:text-blue-800" href=(format!("?{query}page={}", movies.page - 1)) { "Previous" }
                }
                span class="text-gray-600" { "Page " (movies.page) " of " (movies.num_pages) }
                @if movies.has_next() {
                    a class="text-blue-600 hover:text-blue-800" href=(format!("?{query}page={}", movies.page + 1)) { "Next" }
                }
            }
        }
    }
}

pub fn movie_href(m: &movie::Model) -> String {
    format!("/movie/{}", urlencoding::encode(&m.url))
}

fn media(path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/media/{path}")
    }
}
