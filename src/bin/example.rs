use dynconn::{ConnGraph, Vertex};

fn report(g: &ConnGraph<i64>, name_a: &str, a: &Vertex, name_b: &str, b: &Vertex) {
    println!(
        "Are {} and {} connected? {}",
        name_a,
        name_b,
        if g.is_connected(a, b) { "Yes" } else { "No" }
    );
}

fn main() {
    let mut g = ConnGraph::with_augmentation(|a: &i64, b: &i64| a + b);
    let ring: Vec<Vertex> = (0..8).map(|_| Vertex::new()).collect();
    for i in 0..8 {
        g.add_edge(&ring[i], &ring[(i + 1) % 8]).unwrap();
        g.set_vertex_augmentation(&ring[i], i as i64).unwrap();
    }
    println!("Created a ring of 8 vertices with values 0..8");
    report(&g, "0", &ring[0], "4", &ring[4]);
    println!(
        "Component sum at vertex 0: {:?}",
        g.get_component_info(&ring[0]).augmentation
    );

    g.remove_edge(&ring[1], &ring[2]).unwrap();
    println!("Removed edge 1-2; the ring still connects the other way");
    report(&g, "1", &ring[1], "2", &ring[2]);

    g.remove_edge(&ring[5], &ring[6]).unwrap();
    println!("Removed edge 5-6; the ring is now split in two arcs");
    report(&g, "1", &ring[1], "2", &ring[2]);
    report(&g, "2", &ring[2], "5", &ring[5]);
    println!(
        "Component sum at vertex 2: {:?}",
        g.get_component_info(&ring[2]).augmentation
    );
}
