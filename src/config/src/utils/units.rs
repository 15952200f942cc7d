// Copyright 2025 OpenObserve Inc.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Units comparison that accepts common synonyms, so files written by
//! different tools do not trip schema checks over "m" vs "meters".

fn canonical(units: &str) -> String {
    let u = units.trim().to_ascii_lowercase();
    match u.as_str() {
        "m" | "meter" | "meters" | "metre" | "metres" => "m".to_string(),
        "s" | "sec" | "secs" | "second" | "seconds" => "s".to_string(),
        "deg" | "degree" | "degrees" => "degrees".to_string(),
        "degn" | "deg_n" | "degree_north" | "degrees_north" | "degrees north" => {
            "degrees_north".to_string()
        }
        "dege" | "deg_e" | "degree_east" | "degrees_east" | "degrees east" => {
            "degrees_east".to_string()
        }
        "c" | "celsius" | "degc" | "deg_c" | "degree_c" | "degrees_c" | "degree_celsius"
        | "degrees_celsius" => "degree_c".to_string(),
        "m/s" | "m s-1" | "m.s-1" | "meters/second" | "meter/second" | "m/sec" => {
            "m s-1".to_string()
        }
        _ => u,
    }
}

pub fn units_equivalent(a: &str, b: &str) -> bool {
    canonical(a) == canonical(b)
}
